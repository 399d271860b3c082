//! Azure control-plane client.
//!
//! [`CloudProvider`] maps one method to each `az` operation the bootstrap
//! needs. [`AzCli`] implements it by shelling out to the Azure CLI.
//!
//! ## Requirements
//!
//! - `az` CLI installed and logged in (`az login`)
//! - Permission to create management groups, app registrations and role
//!   assignments in the tenant

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::billing::{BillingRoleAssignment, BillingScope};
use crate::core::external::ExternalCli;
use crate::error::Result;

/// Subscription and tenant of the logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub subscription_id: String,
    pub tenant_id: String,
}

/// App registration plus its service principal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServicePrincipal {
    /// Application (client) id.
    #[serde(rename = "appId")]
    pub app_id: String,
    /// Service principal object id.
    #[serde(rename = "id")]
    pub object_id: String,
}

/// Federated identity credential parameters, as accepted by `az`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederatedCredential {
    pub name: String,
    pub issuer: String,
    pub subject: String,
    pub description: String,
    pub audiences: Vec<String>,
}

/// One option in a billing menu.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BillingChoice {
    pub name: String,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

impl BillingChoice {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Menu label: display name with the id, or just the id.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(display) if !display.is_empty() => format!("{} ({})", display, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Typed interface to the Azure control plane.
pub trait CloudProvider {
    /// Subscription and tenant of the current login.
    fn account(&self) -> Result<Account>;

    /// Whether a management group name is still free.
    fn management_group_available(&self, name: &str) -> Result<bool>;

    fn create_management_group(&self, name: &str, parent: &str) -> Result<()>;

    /// Id of the management group, or `None` while it isn't visible.
    fn show_management_group(&self, name: &str) -> Result<Option<String>>;

    fn resource_group_exists(&self, name: &str) -> Result<bool>;

    fn create_resource_group(&self, name: &str, location: &str) -> Result<String>;

    fn show_resource_group(&self, name: &str) -> Result<String>;

    fn find_service_principal(&self, display_name: &str) -> Result<Option<ServicePrincipal>>;

    /// Create the principal, reusing an app registration of the same name.
    fn create_service_principal(&self, display_name: &str) -> Result<ServicePrincipal>;

    /// Names of the federated credentials on an app.
    fn federated_credentials(&self, app_id: &str) -> Result<Vec<String>>;

    fn create_federated_credential(
        &self,
        app_id: &str,
        credential: &FederatedCredential,
    ) -> Result<()>;

    fn find_role_assignment(&self, object_id: &str, role: &str, scope: &str)
        -> Result<Option<String>>;

    fn create_role_assignment(&self, object_id: &str, role: &str, scope: &str) -> Result<String>;

    fn billing_accounts(&self) -> Result<Vec<BillingChoice>>;

    fn billing_profiles(&self, account: &str) -> Result<Vec<BillingChoice>>;

    fn invoice_sections(&self, account: &str, profile: &str) -> Result<Vec<BillingChoice>>;

    /// Id of a billing role assignment matching principal and role, if any.
    fn find_billing_role_assignment(
        &self,
        scope: &BillingScope,
        assignment: &BillingRoleAssignment,
    ) -> Result<Option<String>>;

    fn create_billing_role_assignment(
        &self,
        scope: &BillingScope,
        assignment: &BillingRoleAssignment,
    ) -> Result<String>;
}

const MANAGEMENT_GROUP_NAME_CHECK: &str = "https://management.azure.com/providers/Microsoft.Management/checkNameAvailability?api-version=2021-04-01";

const BILLING_CHOICE_QUERY: &str = "[].{name:name, displayName:displayName}";

/// [`CloudProvider`] backed by the `az` CLI.
#[derive(Debug, Clone, Copy)]
pub struct AzCli {
    cli: ExternalCli,
}

impl AzCli {
    pub fn new() -> Self {
        Self {
            cli: ExternalCli::new("az"),
        }
    }

    fn app_ids(&self, display_name: &str) -> Result<Vec<String>> {
        let query = format!("[?displayName=='{}'].appId", display_name);
        self.cli.run_json(&[
            "ad",
            "app",
            "list",
            "--display-name",
            display_name,
            "--query",
            &query,
            "-o",
            "json",
        ])
    }
}

impl Default for AzCli {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() || value == "null" {
        None
    } else {
        Some(value)
    }
}

impl CloudProvider for AzCli {
    fn account(&self) -> Result<Account> {
        self.cli.run_json(&[
            "account",
            "show",
            "--query",
            "{subscriptionId:id, tenantId:tenantId}",
            "-o",
            "json",
        ])
    }

    fn management_group_available(&self, name: &str) -> Result<bool> {
        let body = serde_json::json!({
            "name": name,
            "type": "Microsoft.Management/managementGroups",
        })
        .to_string();
        let available = self.cli.run(&[
            "rest",
            "--method",
            "post",
            "--url",
            MANAGEMENT_GROUP_NAME_CHECK,
            "--body",
            &body,
            "--query",
            "nameAvailable",
            "-o",
            "tsv",
        ])?;
        trace!(name, available = %available, "management group name check");
        Ok(available.eq_ignore_ascii_case("true"))
    }

    fn create_management_group(&self, name: &str, parent: &str) -> Result<()> {
        self.cli.run(&[
            "account",
            "management-group",
            "create",
            "--name",
            name,
            "--display-name",
            name,
            "--parent",
            parent,
            "-o",
            "none",
        ])?;
        Ok(())
    }

    fn show_management_group(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .cli
            .probe(&[
                "account",
                "management-group",
                "show",
                "--name",
                name,
                "--query",
                "id",
                "-o",
                "tsv",
            ])?
            .and_then(non_empty))
    }

    fn resource_group_exists(&self, name: &str) -> Result<bool> {
        let exists = self.cli.run(&["group", "exists", "--name", name])?;
        Ok(exists.eq_ignore_ascii_case("true"))
    }

    fn create_resource_group(&self, name: &str, location: &str) -> Result<String> {
        self.cli.run(&[
            "group",
            "create",
            "--name",
            name,
            "--location",
            location,
            "--query",
            "id",
            "-o",
            "tsv",
        ])
    }

    fn show_resource_group(&self, name: &str) -> Result<String> {
        self.cli
            .run(&["group", "show", "--name", name, "--query", "id", "-o", "tsv"])
    }

    fn find_service_principal(&self, display_name: &str) -> Result<Option<ServicePrincipal>> {
        let query = format!("[?displayName=='{}'].{{appId:appId, id:id}}", display_name);
        let found: Vec<ServicePrincipal> = self.cli.run_json(&[
            "ad",
            "sp",
            "list",
            "--display-name",
            display_name,
            "--query",
            &query,
            "-o",
            "json",
        ])?;
        Ok(found.into_iter().next())
    }

    fn create_service_principal(&self, display_name: &str) -> Result<ServicePrincipal> {
        let app_id = match self.app_ids(display_name)?.into_iter().next() {
            Some(existing) => existing,
            None => self.cli.run(&[
                "ad",
                "app",
                "create",
                "--display-name",
                display_name,
                "--query",
                "appId",
                "-o",
                "tsv",
            ])?,
        };

        self.cli.run_json(&[
            "ad",
            "sp",
            "create",
            "--id",
            &app_id,
            "--query",
            "{appId:appId, id:id}",
            "-o",
            "json",
        ])
    }

    fn federated_credentials(&self, app_id: &str) -> Result<Vec<String>> {
        self.cli.run_json(&[
            "ad",
            "app",
            "federated-credential",
            "list",
            "--id",
            app_id,
            "--query",
            "[].name",
            "-o",
            "json",
        ])
    }

    fn create_federated_credential(
        &self,
        app_id: &str,
        credential: &FederatedCredential,
    ) -> Result<()> {
        let parameters = serde_json::to_string(credential)?;
        self.cli.run(&[
            "ad",
            "app",
            "federated-credential",
            "create",
            "--id",
            app_id,
            "--parameters",
            &parameters,
            "-o",
            "none",
        ])?;
        Ok(())
    }

    fn find_role_assignment(
        &self,
        object_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<Option<String>> {
        let id = self.cli.run(&[
            "role",
            "assignment",
            "list",
            "--assignee",
            object_id,
            "--role",
            role,
            "--scope",
            scope,
            "--query",
            "[0].id",
            "-o",
            "tsv",
        ])?;
        Ok(non_empty(id))
    }

    fn create_role_assignment(&self, object_id: &str, role: &str, scope: &str) -> Result<String> {
        self.cli.run(&[
            "role",
            "assignment",
            "create",
            "--assignee-object-id",
            object_id,
            "--assignee-principal-type",
            "ServicePrincipal",
            "--role",
            role,
            "--scope",
            scope,
            "--query",
            "id",
            "-o",
            "tsv",
        ])
    }

    fn billing_accounts(&self) -> Result<Vec<BillingChoice>> {
        self.cli.run_json(&[
            "billing",
            "account",
            "list",
            "--query",
            BILLING_CHOICE_QUERY,
            "-o",
            "json",
        ])
    }

    fn billing_profiles(&self, account: &str) -> Result<Vec<BillingChoice>> {
        self.cli.run_json(&[
            "billing",
            "profile",
            "list",
            "--account-name",
            account,
            "--query",
            BILLING_CHOICE_QUERY,
            "-o",
            "json",
        ])
    }

    fn invoice_sections(&self, account: &str, profile: &str) -> Result<Vec<BillingChoice>> {
        self.cli.run_json(&[
            "billing",
            "invoice",
            "section",
            "list",
            "--account-name",
            account,
            "--profile-name",
            profile,
            "--query",
            BILLING_CHOICE_QUERY,
            "-o",
            "json",
        ])
    }

    fn find_billing_role_assignment(
        &self,
        scope: &BillingScope,
        assignment: &BillingRoleAssignment,
    ) -> Result<Option<String>> {
        let url = scope.role_assignments_url();
        let query = format!(
            "value[?properties.principalId=='{}' && ends_with(properties.roleDefinitionId, '/{}')].id | [0]",
            assignment.principal_id,
            assignment.role_id()
        );
        let id = self.cli.run(&[
            "rest", "--method", "get", "--url", &url, "--query", &query, "-o", "tsv",
        ])?;
        Ok(non_empty(id))
    }

    fn create_billing_role_assignment(
        &self,
        scope: &BillingScope,
        assignment: &BillingRoleAssignment,
    ) -> Result<String> {
        let url = scope.create_role_assignment_url();
        let body = serde_json::to_string(assignment)?;
        let id = self.cli.run(&[
            "rest", "--method", "post", "--url", &url, "--body", &body, "--query", "id", "-o",
            "tsv",
        ])?;
        Ok(non_empty(id).unwrap_or_else(|| assignment.role_definition_id.clone()))
    }
}
