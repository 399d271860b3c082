//! Test fixtures and constants.

/// A complete configuration for every lifecycle stage.
pub const FULL_CONFIG: &str = r#"# azseed configuration
DOMAIN=example.com
LOCATION=eastus
MANAGEMENT_GROUP_PARENT=tenant-root
OIDC_ISSUERS=("seed=https://seed.oidc" "development=https://dev.oidc" "production=https://prod.oidc")
SECRET_PROJECTS=("seed=seed-proj" "development=dev-proj" "production=prod-proj")
BILLING_ACCOUNT_ID=acct
BILLING_PROFILE_ID=prof
INVOICE_SECTION_ID=sect
"#;

/// Config with the production issuer left blank.
pub const INCOMPLETE_CONFIG: &str = r#"DOMAIN=example.com
MANAGEMENT_GROUP_PARENT=tenant-root
OIDC_ISSUERS=("seed=https://seed.oidc" "development=https://dev.oidc" "production=")
"#;

/// Hand-written config with commented-out entries.
pub const COMMENTED_CONFIG: &str = r#"# Organization
#DOMAIN=old.example
# LOCATION=westeurope
KEEP_ME=1
"#;

/// Config with a commented example line ahead of the live value.
pub const EXAMPLE_LINE_CONFIG: &str = r#"# DOMAIN=example.org
DOMAIN=old.example
"#;
