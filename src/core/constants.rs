//! Constants used throughout azseed.
//!
//! Centralizes magic strings, naming conventions, and polling limits.

use std::time::Duration;

/// Default configuration file name, relative to the working directory.
pub const CONFIG_FILE: &str = "azseed.env";

/// Region used when neither the flag nor the config file names one.
pub const DEFAULT_LOCATION: &str = "eastus";

/// Lifecycle stages, in provisioning order.
pub const LIFECYCLE_STAGES: &[&str] = &["seed", "development", "production"];

/// Every environment the tool provisions. The first segment is the stage.
pub const ENVIRONMENTS: &[&str] = &[
    "seed",
    "development/sandbox",
    "development/integration",
    "production/staging",
    "production/live",
];

/// Environment that intentionally has no management-group hierarchy.
pub const SEED: &str = "seed";

/// Prefix shared by per-stage resource group and service principal names.
pub const OPERATOR_PREFIX: &str = "azureserviceoperator";

/// Kubernetes service account the operator runs as.
pub const FEDERATED_SUBJECT: &str =
    "system:serviceaccount:azureserviceoperator-athena-system:azureserviceoperator-default";

/// Token audience for Azure AD workload identity exchange.
pub const FEDERATED_AUDIENCE: &str = "api://AzureADTokenExchange";

/// Built-in RBAC role granted to each stage principal.
pub const OWNER_ROLE: &str = "Owner";

/// Billing role definition id for "Azure subscription creator" on an invoice section.
pub const SUBSCRIPTION_CREATOR_ROLE_ID: &str = "a0bcee42-bf30-4d1b-926a-48d21664ef71";

/// ARM endpoint for billing calls.
pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// API version for `createBillingRoleAssignment`.
pub const BILLING_API_VERSION: &str = "2024-04-01";

/// Secret holding the operator settings in each stage's project.
pub const SETTINGS_SECRET: &str = "aso-controller-settings";

/// Wait before the first readiness probe of a new management group.
pub const MANAGEMENT_GROUP_SETTLE: Duration = Duration::from_secs(30);

/// Readiness probes before a management group is reported as pending.
pub const MANAGEMENT_GROUP_ATTEMPTS: u32 = 20;

/// Wait between readiness probes.
pub const MANAGEMENT_GROUP_DELAY: Duration = Duration::from_secs(3);

/// Config file keys.
pub mod keys {
    pub const DOMAIN: &str = "DOMAIN";
    pub const LOCATION: &str = "LOCATION";
    pub const MANAGEMENT_GROUP_PARENT: &str = "MANAGEMENT_GROUP_PARENT";
    pub const OIDC_ISSUERS: &str = "OIDC_ISSUERS";
    pub const SECRET_PROJECTS: &str = "SECRET_PROJECTS";
    pub const BILLING_ACCOUNT_ID: &str = "BILLING_ACCOUNT_ID";
    pub const BILLING_PROFILE_ID: &str = "BILLING_PROFILE_ID";
    pub const INVOICE_SECTION_ID: &str = "INVOICE_SECTION_ID";
}
