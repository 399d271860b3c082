//! In-memory fakes for testing.
//!
//! [`MockCloud`] and [`MockSecretManager`] keep all state in memory and log
//! every call so tests can assert that an idempotent operation made no
//! create call on a rerun. [`MockClock`] records sleeps without sleeping.
//!
//! Set `fail_on` to an operation name to make that call return a
//! `CommandError::Failed`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::core::billing::{BillingRoleAssignment, BillingScope};
use crate::core::cloud::{
    Account, BillingChoice, CloudProvider, FederatedCredential, ServicePrincipal,
};
use crate::core::provision::management_group_id;
use crate::core::retry::Clock;
use crate::core::secret_manager::{SecretManager, SecretVersion, VersionState};
use crate::error::{CommandError, Result};

fn injected(program: &'static str, operation: &str) -> crate::error::Error {
    CommandError::Failed {
        program,
        code: 1,
        stderr: format!("injected failure in {}", operation),
    }
    .into()
}

/// Clock that records requested sleeps.
#[derive(Debug, Default)]
pub struct MockClock {
    sleeps: RefCell<Vec<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Clock for MockClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// In-memory Azure control plane.
pub struct MockCloud {
    account: RefCell<Account>,
    management_groups: RefCell<BTreeMap<String, String>>,
    resource_groups: RefCell<BTreeMap<String, String>>,
    apps: RefCell<BTreeMap<String, String>>,
    principals: RefCell<BTreeMap<String, ServicePrincipal>>,
    federated: RefCell<BTreeMap<String, Vec<FederatedCredential>>>,
    roles: RefCell<Vec<(String, String, String, String)>>,
    billing: RefCell<(Vec<BillingChoice>, Vec<BillingChoice>, Vec<BillingChoice>)>,
    billing_assignments: RefCell<Vec<(BillingScope, BillingRoleAssignment, String)>>,
    calls: RefCell<Vec<String>>,
    next_id: Cell<u32>,

    /// Readiness probes that report a new management group as missing.
    pub management_group_lag: Cell<u32>,
    /// Operation name whose call fails.
    pub fail_on: RefCell<Option<&'static str>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            account: RefCell::new(Account {
                subscription_id: "sub-0001".to_string(),
                tenant_id: "tenant-0001".to_string(),
            }),
            management_groups: RefCell::new(BTreeMap::new()),
            resource_groups: RefCell::new(BTreeMap::new()),
            apps: RefCell::new(BTreeMap::new()),
            principals: RefCell::new(BTreeMap::new()),
            federated: RefCell::new(BTreeMap::new()),
            roles: RefCell::new(Vec::new()),
            billing: RefCell::new((Vec::new(), Vec::new(), Vec::new())),
            billing_assignments: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            management_group_lag: Cell::new(0),
            fail_on: RefCell::new(None),
        }
    }

    /// Every call made so far, as `operation:detail`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls whose operation starts with `create`.
    pub fn create_calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("create"))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Parent of a management group, if it exists.
    pub fn management_group_parent(&self, name: &str) -> Option<String> {
        self.management_groups.borrow().get(name).cloned()
    }

    /// Pre-populate a management group.
    pub fn add_management_group(&self, name: &str, parent: &str) {
        self.management_groups
            .borrow_mut()
            .insert(name.to_string(), parent.to_string());
    }

    /// Pre-populate an app registration without a service principal.
    pub fn add_app(&self, display_name: &str, app_id: &str) {
        self.apps
            .borrow_mut()
            .insert(display_name.to_string(), app_id.to_string());
    }

    pub fn set_billing(
        &self,
        accounts: Vec<BillingChoice>,
        profiles: Vec<BillingChoice>,
        sections: Vec<BillingChoice>,
    ) {
        *self.billing.borrow_mut() = (accounts, profiles, sections);
    }

    pub fn federated_credentials_of(&self, app_id: &str) -> Vec<FederatedCredential> {
        self.federated
            .borrow()
            .get(app_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn billing_assignments(&self) -> Vec<(BillingScope, BillingRoleAssignment)> {
        self.billing_assignments
            .borrow()
            .iter()
            .map(|(scope, assignment, _)| (scope.clone(), assignment.clone()))
            .collect()
    }

    fn record(&self, operation: &'static str, detail: impl AsRef<str>) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("{}:{}", operation, detail.as_ref()));
        if *self.fail_on.borrow() == Some(operation) {
            return Err(injected("az", operation));
        }
        Ok(())
    }

    fn id(&self, prefix: &str) -> String {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        format!("{}-{:04}", prefix, n)
    }
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudProvider for MockCloud {
    fn account(&self) -> Result<Account> {
        self.record("account", "")?;
        Ok(self.account.borrow().clone())
    }

    fn management_group_available(&self, name: &str) -> Result<bool> {
        self.record("management_group_available", name)?;
        Ok(!self.management_groups.borrow().contains_key(name))
    }

    fn create_management_group(&self, name: &str, parent: &str) -> Result<()> {
        self.record("create_management_group", format!("{}<-{}", name, parent))?;
        self.add_management_group(name, parent);
        Ok(())
    }

    fn show_management_group(&self, name: &str) -> Result<Option<String>> {
        self.record("show_management_group", name)?;
        let lag = self.management_group_lag.get();
        if lag > 0 {
            self.management_group_lag.set(lag - 1);
            return Ok(None);
        }
        Ok(self
            .management_groups
            .borrow()
            .get(name)
            .map(|_| management_group_id(name)))
    }

    fn resource_group_exists(&self, name: &str) -> Result<bool> {
        self.record("resource_group_exists", name)?;
        Ok(self.resource_groups.borrow().contains_key(name))
    }

    fn create_resource_group(&self, name: &str, location: &str) -> Result<String> {
        self.record("create_resource_group", format!("{}@{}", name, location))?;
        self.resource_groups
            .borrow_mut()
            .insert(name.to_string(), location.to_string());
        self.show_resource_group(name)
    }

    fn show_resource_group(&self, name: &str) -> Result<String> {
        let sub = self.account.borrow().subscription_id.clone();
        Ok(format!("/subscriptions/{}/resourceGroups/{}", sub, name))
    }

    fn find_service_principal(&self, display_name: &str) -> Result<Option<ServicePrincipal>> {
        self.record("find_service_principal", display_name)?;
        Ok(self.principals.borrow().get(display_name).cloned())
    }

    fn create_service_principal(&self, display_name: &str) -> Result<ServicePrincipal> {
        self.record("create_service_principal", display_name)?;
        let existing_app = self.apps.borrow().get(display_name).cloned();
        let app_id = match existing_app {
            Some(app_id) => app_id,
            None => {
                let app_id = self.id("app");
                self.add_app(display_name, &app_id);
                app_id
            }
        };
        let sp = ServicePrincipal {
            app_id,
            object_id: self.id("obj"),
        };
        self.principals
            .borrow_mut()
            .insert(display_name.to_string(), sp.clone());
        Ok(sp)
    }

    fn federated_credentials(&self, app_id: &str) -> Result<Vec<String>> {
        self.record("federated_credentials", app_id)?;
        Ok(self
            .federated_credentials_of(app_id)
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    fn create_federated_credential(
        &self,
        app_id: &str,
        credential: &FederatedCredential,
    ) -> Result<()> {
        self.record(
            "create_federated_credential",
            format!("{}/{}", app_id, credential.name),
        )?;
        self.federated
            .borrow_mut()
            .entry(app_id.to_string())
            .or_default()
            .push(credential.clone());
        Ok(())
    }

    fn find_role_assignment(
        &self,
        object_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<Option<String>> {
        self.record("find_role_assignment", format!("{} {} {}", object_id, role, scope))?;
        Ok(self
            .roles
            .borrow()
            .iter()
            .find(|(o, r, s, _)| o == object_id && r == role && s == scope)
            .map(|(_, _, _, id)| id.clone()))
    }

    fn create_role_assignment(&self, object_id: &str, role: &str, scope: &str) -> Result<String> {
        self.record("create_role_assignment", format!("{} {} {}", object_id, role, scope))?;
        let id = format!("{}/providers/Microsoft.Authorization/roleAssignments/{}", scope, self.id("ra"));
        self.roles.borrow_mut().push((
            object_id.to_string(),
            role.to_string(),
            scope.to_string(),
            id.clone(),
        ));
        Ok(id)
    }

    fn billing_accounts(&self) -> Result<Vec<BillingChoice>> {
        self.record("billing_accounts", "")?;
        Ok(self.billing.borrow().0.clone())
    }

    fn billing_profiles(&self, account: &str) -> Result<Vec<BillingChoice>> {
        self.record("billing_profiles", account)?;
        Ok(self.billing.borrow().1.clone())
    }

    fn invoice_sections(&self, account: &str, profile: &str) -> Result<Vec<BillingChoice>> {
        self.record("invoice_sections", format!("{}/{}", account, profile))?;
        Ok(self.billing.borrow().2.clone())
    }

    fn find_billing_role_assignment(
        &self,
        scope: &BillingScope,
        assignment: &BillingRoleAssignment,
    ) -> Result<Option<String>> {
        self.record("find_billing_role_assignment", &assignment.principal_id)?;
        Ok(self
            .billing_assignments
            .borrow()
            .iter()
            .find(|(s, a, _)| {
                s == scope
                    && a.principal_id == assignment.principal_id
                    && a.role_id() == assignment.role_id()
            })
            .map(|(_, _, id)| id.clone()))
    }

    fn create_billing_role_assignment(
        &self,
        scope: &BillingScope,
        assignment: &BillingRoleAssignment,
    ) -> Result<String> {
        self.record("create_billing_role_assignment", &assignment.principal_id)?;
        let id = format!(
            "/providers/Microsoft.Billing/{}/billingRoleAssignments/{}",
            scope.id_path(),
            self.id("bra")
        );
        self.billing_assignments
            .borrow_mut()
            .push((scope.clone(), assignment.clone(), id.clone()));
        Ok(id)
    }
}

struct StoredVersion {
    version: SecretVersion,
    value: String,
}

/// In-memory secret store.
pub struct MockSecretManager {
    secrets: RefCell<BTreeMap<(String, String), Vec<StoredVersion>>>,
    calls: RefCell<Vec<String>>,
    clock: Cell<i64>,

    /// Operation name whose call fails.
    pub fail_on: RefCell<Option<&'static str>>,
}

impl MockSecretManager {
    pub fn new() -> Self {
        Self {
            secrets: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
            clock: Cell::new(0),
            fail_on: RefCell::new(None),
        }
    }

    /// Pre-populate a secret with `count` enabled versions.
    pub fn with_versions(&self, project: &str, name: &str, count: usize) {
        for i in 0..count {
            self.push_version(project, name, &format!("value-{}", i + 1));
        }
    }

    /// Change the state of a stored version.
    pub fn set_state(&self, project: &str, name: &str, version: &str, state: VersionState) {
        let mut secrets = self.secrets.borrow_mut();
        if let Some(versions) = secrets.get_mut(&(project.to_string(), name.to_string())) {
            for stored in versions.iter_mut().filter(|s| s.version.id() == version) {
                stored.version.state = state;
            }
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Version ids in the given state, oldest first.
    pub fn version_ids(&self, project: &str, name: &str, state: VersionState) -> Vec<String> {
        self.secrets
            .borrow()
            .get(&(project.to_string(), name.to_string()))
            .map(|versions| {
                versions
                    .iter()
                    .filter(|s| s.version.state == state)
                    .map(|s| s.version.id().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Payload of the newest version.
    pub fn latest_value(&self, project: &str, name: &str) -> Option<String> {
        self.secrets
            .borrow()
            .get(&(project.to_string(), name.to_string()))
            .and_then(|versions| versions.last().map(|s| s.value.clone()))
    }

    fn record(&self, operation: &'static str, detail: impl AsRef<str>) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("{}:{}", operation, detail.as_ref()));
        if *self.fail_on.borrow() == Some(operation) {
            return Err(injected("gcloud", operation));
        }
        Ok(())
    }

    fn push_version(&self, project: &str, name: &str, value: &str) {
        let tick = self.clock.get() + 1;
        self.clock.set(tick);
        let created: DateTime<Utc> = Utc
            .timestamp_opt(1_700_000_000 + tick, 0)
            .single()
            .unwrap_or_default();

        let mut secrets = self.secrets.borrow_mut();
        let versions = secrets
            .entry((project.to_string(), name.to_string()))
            .or_default();
        let number = versions.len() + 1;
        versions.push(StoredVersion {
            version: SecretVersion {
                name: format!("projects/{}/secrets/{}/versions/{}", project, name, number),
                state: VersionState::Enabled,
                create_time: created,
            },
            value: value.to_string(),
        });
    }
}

impl Default for MockSecretManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretManager for MockSecretManager {
    fn secret_exists(&self, project: &str, name: &str) -> Result<bool> {
        self.record("secret_exists", format!("{}/{}", project, name))?;
        Ok(self
            .secrets
            .borrow()
            .contains_key(&(project.to_string(), name.to_string())))
    }

    fn create_secret(&self, project: &str, name: &str, value: &str) -> Result<()> {
        self.record("create_secret", format!("{}/{}", project, name))?;
        self.push_version(project, name, value);
        Ok(())
    }

    fn add_version(&self, project: &str, name: &str, value: &str) -> Result<()> {
        self.record("add_version", format!("{}/{}", project, name))?;
        self.push_version(project, name, value);
        Ok(())
    }

    fn list_versions(&self, project: &str, name: &str) -> Result<Vec<SecretVersion>> {
        self.record("list_versions", format!("{}/{}", project, name))?;
        let mut versions: Vec<SecretVersion> = self
            .secrets
            .borrow()
            .get(&(project.to_string(), name.to_string()))
            .map(|versions| {
                versions
                    .iter()
                    .map(|s| s.version.clone())
                    .filter(|v| matches!(v.state, VersionState::Enabled | VersionState::Disabled))
                    .collect()
            })
            .unwrap_or_default();
        versions.sort_by_key(|v| v.create_time);
        Ok(versions)
    }

    fn destroy_version(&self, project: &str, name: &str, version: &str) -> Result<()> {
        self.record("destroy_version", format!("{}/{}/{}", project, name, version))?;
        self.set_state(project, name, version, VersionState::Destroyed);
        Ok(())
    }
}
