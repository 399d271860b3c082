//! Idempotent resource provisioning.
//!
//! Every `ensure_*` operation validates its inputs, probes for the resource,
//! and creates it only when absent. Reruns return the existing id and make
//! no create call.

use std::fmt;

use tracing::{debug, info, warn};

use crate::core::billing::BillingScope;
use crate::core::cloud::{CloudProvider, FederatedCredential, ServicePrincipal};
use crate::core::constants::{FEDERATED_AUDIENCE, FEDERATED_SUBJECT};
use crate::core::environment::Environment;
use crate::core::retry::{poll, Clock, Readiness, RetryPolicy};
use crate::error::{require, Result};

/// How an ensure call left the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Existing,
    /// Created, but not visible before the retry policy ran out.
    Pending,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Created => "created",
            State::Existing => "exists",
            State::Pending => "pending",
        };
        f.write_str(s)
    }
}

/// Identifier of a provisioned resource and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub id: String,
    pub state: State,
}

impl Provisioned {
    fn new(id: impl Into<String>, state: State) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

/// Management group resource id.
pub fn management_group_id(name: &str) -> String {
    format!("/providers/Microsoft.Management/managementGroups/{}", name)
}

/// Runs ensure operations against a [`CloudProvider`].
pub struct Provisioner<'a> {
    cloud: &'a dyn CloudProvider,
    clock: &'a dyn Clock,
    policy: RetryPolicy,
}

impl<'a> Provisioner<'a> {
    pub fn new(cloud: &'a dyn CloudProvider, clock: &'a dyn Clock) -> Self {
        Self {
            cloud,
            clock,
            policy: RetryPolicy::management_group(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cloud(&self) -> &'a dyn CloudProvider {
        self.cloud
    }

    /// Ensure a management group exists under `parent`.
    ///
    /// A new group is polled until visible. If it never shows up within the
    /// policy the result is [`State::Pending`], logged but not an error.
    pub fn ensure_management_group(&self, name: &str, parent: &str) -> Result<Provisioned> {
        require("management group", &[("name", name), ("parent", parent)])?;

        if !self.cloud.management_group_available(name)? {
            debug!(name, "management group exists");
            return Ok(Provisioned::new(management_group_id(name), State::Existing));
        }

        info!(name, parent, "creating management group");
        self.cloud.create_management_group(name, parent)?;

        let mut id = None;
        let readiness = poll(&self.policy, self.clock, || {
            id = self.cloud.show_management_group(name)?;
            Ok(id.is_some())
        })?;

        match readiness {
            Readiness::Ready { attempts } => {
                debug!(name, attempts, "management group ready");
                Ok(Provisioned::new(
                    id.unwrap_or_else(|| management_group_id(name)),
                    State::Created,
                ))
            }
            Readiness::NotReady { attempts } => {
                warn!(name, attempts, "management group not ready after polling");
                Ok(Provisioned::new(management_group_id(name), State::Pending))
            }
        }
    }

    /// Ensure the management-group chain for an environment path.
    ///
    /// `development/sandbox` ensures `development` under `root`, then
    /// `sandbox` under `development`. The seed environment has no hierarchy
    /// and makes no calls.
    ///
    /// Once a segment is [`State::Pending`] its children can't be parented
    /// yet, so they are reported as pending without any call.
    pub fn ensure_management_group_path(
        &self,
        environment: &Environment,
        root: &str,
    ) -> Result<Vec<Provisioned>> {
        if environment.is_seed() {
            debug!("seed environment has no management groups");
            return Ok(Vec::new());
        }
        require("management group path", &[("parent", root)])?;

        let mut parent = root.to_string();
        let mut blocked = false;
        let mut groups = Vec::new();
        for segment in environment.segments() {
            if blocked {
                warn!(name = segment, parent = %parent, "parent management group pending, deferring");
                groups.push(Provisioned::new(management_group_id(segment), State::Pending));
                continue;
            }
            let group = self.ensure_management_group(segment, &parent)?;
            blocked = group.state == State::Pending;
            groups.push(group);
            parent = segment.to_string();
        }
        Ok(groups)
    }

    pub fn ensure_resource_group(&self, name: &str, location: &str) -> Result<Provisioned> {
        require("resource group", &[("name", name), ("location", location)])?;

        if self.cloud.resource_group_exists(name)? {
            debug!(name, "resource group exists");
            return Ok(Provisioned::new(
                self.cloud.show_resource_group(name)?,
                State::Existing,
            ));
        }

        info!(name, location, "creating resource group");
        let id = self.cloud.create_resource_group(name, location)?;
        Ok(Provisioned::new(id, State::Created))
    }

    /// Ensure a service principal with this display name. The id is the app id.
    pub fn ensure_service_principal(
        &self,
        display_name: &str,
    ) -> Result<(ServicePrincipal, State)> {
        require("service principal", &[("display name", display_name)])?;

        if let Some(sp) = self.cloud.find_service_principal(display_name)? {
            debug!(display_name, app_id = %sp.app_id, "service principal exists");
            return Ok((sp, State::Existing));
        }

        info!(display_name, "creating service principal");
        let sp = self.cloud.create_service_principal(display_name)?;
        Ok((sp, State::Created))
    }

    /// Trust tokens from `issuer` for the operator's service account.
    pub fn ensure_federated_credential(
        &self,
        app_id: &str,
        name: &str,
        issuer: &str,
    ) -> Result<Provisioned> {
        require(
            "federated credential",
            &[("app id", app_id), ("name", name), ("issuer", issuer)],
        )?;

        if self
            .cloud
            .federated_credentials(app_id)?
            .iter()
            .any(|existing| existing == name)
        {
            debug!(app_id, name, "federated credential exists");
            return Ok(Provisioned::new(name, State::Existing));
        }

        let credential = FederatedCredential {
            name: name.to_string(),
            issuer: issuer.to_string(),
            subject: FEDERATED_SUBJECT.to_string(),
            description: format!("Workload identity for {}", FEDERATED_SUBJECT),
            audiences: vec![FEDERATED_AUDIENCE.to_string()],
        };
        info!(app_id, name, issuer, "creating federated credential");
        self.cloud.create_federated_credential(app_id, &credential)?;
        Ok(Provisioned::new(name, State::Created))
    }

    pub fn ensure_role_assignment(
        &self,
        object_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<Provisioned> {
        require(
            "role assignment",
            &[("object id", object_id), ("role", role), ("scope", scope)],
        )?;

        if let Some(id) = self.cloud.find_role_assignment(object_id, role, scope)? {
            debug!(object_id, role, scope, "role assignment exists");
            return Ok(Provisioned::new(id, State::Existing));
        }

        info!(object_id, role, scope, "creating role assignment");
        let id = self.cloud.create_role_assignment(object_id, role, scope)?;
        Ok(Provisioned::new(id, State::Created))
    }

    /// Grant a billing role on an invoice section.
    pub fn ensure_billing_role_assignment(
        &self,
        scope: &BillingScope,
        object_id: &str,
        tenant_id: &str,
        role_id: &str,
    ) -> Result<Provisioned> {
        let assignment = scope.role_assignment(object_id, tenant_id, role_id)?;

        if let Some(id) = self.cloud.find_billing_role_assignment(scope, &assignment)? {
            debug!(object_id, scope = %scope.id_path(), "billing role assignment exists");
            return Ok(Provisioned::new(id, State::Existing));
        }

        info!(object_id, scope = %scope.id_path(), role_id, "creating billing role assignment");
        let id = self.cloud.create_billing_role_assignment(scope, &assignment)?;
        Ok(Provisioned::new(id, State::Created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{MockClock, MockCloud};
    use crate::error::{Error, ValidationError};
    use std::time::Duration;

    fn env(path: &str) -> Environment {
        Environment::parse(path).unwrap()
    }

    #[test]
    fn test_management_group_created_then_existing() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let first = p.ensure_management_group("production", "root").unwrap();
        assert_eq!(first.state, State::Created);
        assert_eq!(
            first.id,
            "/providers/Microsoft.Management/managementGroups/production"
        );

        cloud.clear_calls();
        let second = p.ensure_management_group("production", "root").unwrap();
        assert_eq!(second.state, State::Existing);
        assert_eq!(second.id, first.id);
        assert!(cloud.create_calls().is_empty());
    }

    #[test]
    fn test_management_group_waits_for_visibility() {
        let cloud = MockCloud::new();
        cloud.management_group_lag.set(2);
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let result = p.ensure_management_group("development", "root").unwrap();
        assert_eq!(result.state, State::Created);
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(3),
                Duration::from_secs(3)
            ]
        );
    }

    #[test]
    fn test_management_group_pending_does_not_fail() {
        let cloud = MockCloud::new();
        cloud.management_group_lag.set(100);
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let result = p.ensure_management_group("development", "root").unwrap();
        assert_eq!(result.state, State::Pending);
        let probes = cloud
            .calls()
            .iter()
            .filter(|c| c.starts_with("show_management_group"))
            .count();
        assert_eq!(probes, 20);
    }

    #[test]
    fn test_missing_parameter_fails_before_any_call() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let err = p.ensure_management_group("live", "").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingParameter {
                parameter: "parent",
                ..
            })
        ));
        assert!(p.ensure_resource_group("", "eastus").is_err());
        assert!(p.ensure_service_principal("").is_err());
        assert!(p.ensure_federated_credential("app", "name", "").is_err());
        assert!(p.ensure_role_assignment("obj", "Owner", "").is_err());
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_hierarchy_creates_parent_before_child() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let groups = p
            .ensure_management_group_path(&env("production/live"), "tenant-root")
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(
            cloud.create_calls(),
            vec![
                "create_management_group:production<-tenant-root",
                "create_management_group:live<-production",
            ]
        );
        assert_eq!(
            cloud.management_group_parent("live").as_deref(),
            Some("production")
        );
    }

    #[test]
    fn test_hierarchy_reuses_existing_parent() {
        let cloud = MockCloud::new();
        cloud.add_management_group("production", "tenant-root");
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let groups = p
            .ensure_management_group_path(&env("production/live"), "tenant-root")
            .unwrap();
        assert_eq!(groups[0].state, State::Existing);
        assert_eq!(groups[1].state, State::Created);
        assert_eq!(cloud.create_calls(), vec!["create_management_group:live<-production"]);
    }

    #[test]
    fn test_hierarchy_defers_children_of_pending_parent() {
        let cloud = MockCloud::new();
        cloud.management_group_lag.set(100);
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let groups = p
            .ensure_management_group_path(&env("production/live"), "tenant-root")
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.state == State::Pending));
        assert_eq!(
            groups[1].id,
            "/providers/Microsoft.Management/managementGroups/live"
        );
        assert_eq!(
            cloud.create_calls(),
            vec!["create_management_group:production<-tenant-root"]
        );
        assert!(!cloud.calls().iter().any(|c| c.ends_with(":live")));
    }

    #[test]
    fn test_seed_hierarchy_is_noop() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let groups = p.ensure_management_group_path(&env("seed"), "").unwrap();
        assert!(groups.is_empty());
        assert!(cloud.calls().is_empty());
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_resource_group_idempotent() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let first = p.ensure_resource_group("azureserviceoperator-seed", "eastus").unwrap();
        cloud.clear_calls();
        let second = p.ensure_resource_group("azureserviceoperator-seed", "eastus").unwrap();

        assert_eq!(first.state, State::Created);
        assert_eq!(second.state, State::Existing);
        assert_eq!(first.id, second.id);
        assert!(cloud.create_calls().is_empty());
    }

    #[test]
    fn test_service_principal_idempotent() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let (first, state) = p.ensure_service_principal("aso-dev").unwrap();
        assert_eq!(state, State::Created);
        cloud.clear_calls();
        let (second, state) = p.ensure_service_principal("aso-dev").unwrap();
        assert_eq!(state, State::Existing);
        assert_eq!(first, second);
        assert!(cloud.create_calls().is_empty());
    }

    #[test]
    fn test_service_principal_reuses_orphaned_app() {
        let cloud = MockCloud::new();
        cloud.add_app("aso-dev", "app-existing");
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let (sp, _) = p.ensure_service_principal("aso-dev").unwrap();
        assert_eq!(sp.app_id, "app-existing");
    }

    #[test]
    fn test_federated_credential_payload_and_idempotency() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let first = p
            .ensure_federated_credential("app-1", "seed-workload-identity", "https://oidc")
            .unwrap();
        assert_eq!(first.state, State::Created);

        let stored = cloud.federated_credentials_of("app-1");
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].subject,
            "system:serviceaccount:azureserviceoperator-athena-system:azureserviceoperator-default"
        );
        assert_eq!(stored[0].audiences, vec!["api://AzureADTokenExchange"]);
        assert_eq!(stored[0].issuer, "https://oidc");

        cloud.clear_calls();
        let second = p
            .ensure_federated_credential("app-1", "seed-workload-identity", "https://oidc")
            .unwrap();
        assert_eq!(second.state, State::Existing);
        assert!(cloud.create_calls().is_empty());
    }

    #[test]
    fn test_role_assignment_idempotent() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        let first = p.ensure_role_assignment("obj-1", "Owner", "/subscriptions/s").unwrap();
        cloud.clear_calls();
        let second = p.ensure_role_assignment("obj-1", "Owner", "/subscriptions/s").unwrap();
        assert_eq!(second.state, State::Existing);
        assert_eq!(first.id, second.id);
        assert!(cloud.create_calls().is_empty());
    }

    #[test]
    fn test_billing_role_assignment_idempotent() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);
        let scope = BillingScope::new("acct", "prof", "sect");

        let first = p
            .ensure_billing_role_assignment(&scope, "obj-1", "tenant", "role-1")
            .unwrap();
        assert_eq!(first.state, State::Created);

        cloud.clear_calls();
        let second = p
            .ensure_billing_role_assignment(&scope, "obj-1", "tenant", "role-1")
            .unwrap();
        assert_eq!(second.state, State::Existing);
        assert_eq!(second.id, first.id);
        assert!(cloud.create_calls().is_empty());
        assert_eq!(cloud.billing_assignments().len(), 1);
    }

    #[test]
    fn test_billing_role_assignment_is_per_principal() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);
        let scope = BillingScope::new("acct", "prof", "sect");

        p.ensure_billing_role_assignment(&scope, "obj-1", "tenant", "role-1")
            .unwrap();
        let other = p
            .ensure_billing_role_assignment(&scope, "obj-2", "tenant", "role-1")
            .unwrap();
        assert_eq!(other.state, State::Created);
        assert_eq!(cloud.billing_assignments().len(), 2);
    }

    #[test]
    fn test_billing_role_assignment_validates_before_calls() {
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);
        let scope = BillingScope::new("acct", "prof", "sect");

        assert!(p
            .ensure_billing_role_assignment(&scope, "", "tenant", "role-1")
            .is_err());
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_external_failure_propagates() {
        let cloud = MockCloud::new();
        *cloud.fail_on.borrow_mut() = Some("create_management_group");
        let clock = MockClock::new();
        let p = Provisioner::new(&cloud, &clock);

        assert!(matches!(
            p.ensure_management_group("development", "root"),
            Err(Error::Command(_))
        ));
    }
}
