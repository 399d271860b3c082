//! Configuration loaded from `azseed.env` and command-line flags.
//!
//! Built once per invocation and passed to every operation.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::billing::BillingScope;
use crate::core::constants::{keys, DEFAULT_LOCATION, LIFECYCLE_STAGES};
use crate::core::env::EnvFile;
use crate::core::map::NameValueMap;
use crate::error::{ConfigError, Result};

/// Values given on the command line. They win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub domain: Option<String>,
    pub location: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub domain: String,
    pub location: String,
    pub management_group_parent: String,
    pub oidc_issuers: NameValueMap,
    pub secret_projects: NameValueMap,
    pub billing: Option<BillingScope>,
}

impl Config {
    /// Load from `path`, applying `overrides`.
    ///
    /// # Errors
    ///
    /// `ConfigError::NotInitialized` if the file is missing,
    /// `ConfigError::InvalidArray` if a map value is malformed.
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        let file = EnvFile::load(path)?;
        Self::from_file(&file, overrides)
    }

    pub fn from_file(file: &EnvFile, overrides: &Overrides) -> Result<Self> {
        let oidc_issuers = read_map(file, keys::OIDC_ISSUERS)?;
        let secret_projects = read_map(file, keys::SECRET_PROJECTS)?;

        let config = Self {
            path: file.path().to_path_buf(),
            domain: overrides
                .domain
                .clone()
                .or_else(|| file.get(keys::DOMAIN))
                .unwrap_or_default(),
            location: overrides
                .location
                .clone()
                .or_else(|| file.get(keys::LOCATION))
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            management_group_parent: file.get(keys::MANAGEMENT_GROUP_PARENT).unwrap_or_default(),
            oidc_issuers,
            secret_projects,
            billing: BillingScope::from_parts(
                file.get(keys::BILLING_ACCOUNT_ID),
                file.get(keys::BILLING_PROFILE_ID),
                file.get(keys::INVOICE_SECTION_ID),
            ),
        };

        debug!(
            domain = %config.domain,
            location = %config.location,
            billing = config.billing.is_some(),
            "config loaded"
        );
        Ok(config)
    }

    /// Domain with dots replaced, for use in resource names.
    pub fn domain_slug(&self) -> String {
        self.domain.replace('.', "-")
    }

    /// OIDC issuer of a stage, or `""`.
    pub fn issuer(&self, stage: &str) -> &str {
        self.oidc_issuers.value_of(stage)
    }

    /// Secret manager project of a stage, or `""`.
    pub fn secret_project(&self, stage: &str) -> &str {
        self.secret_projects.value_of(stage)
    }

    /// Check everything `apply` and `output` need.
    pub fn validate_for_apply(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(ConfigError::MissingKey(keys::DOMAIN).into());
        }
        if self.location.is_empty() {
            return Err(ConfigError::MissingKey(keys::LOCATION).into());
        }
        if self.management_group_parent.is_empty() {
            return Err(ConfigError::MissingKey(keys::MANAGEMENT_GROUP_PARENT).into());
        }
        require_every_stage(&self.oidc_issuers, keys::OIDC_ISSUERS)
    }

    /// Check everything `save-secrets` needs on top of `apply`.
    pub fn validate_for_secrets(&self) -> Result<()> {
        self.validate_for_apply()?;
        require_every_stage(&self.secret_projects, keys::SECRET_PROJECTS)
    }
}

fn read_map(file: &EnvFile, key: &'static str) -> Result<NameValueMap> {
    let Some(raw) = file.get(key) else {
        return Ok(NameValueMap::new());
    };
    let map = NameValueMap::parse(&raw).map_err(|reason| ConfigError::InvalidArray {
        key: key.to_string(),
        reason,
    })?;
    for dup in map.duplicates() {
        warn!(key, stage = dup, "duplicate entry ignored, first one wins");
    }
    Ok(map)
}

fn require_every_stage(map: &NameValueMap, key: &'static str) -> Result<()> {
    for stage in LIFECYCLE_STAGES {
        if map.value_of(stage).is_empty() {
            return Err(ConfigError::MissingStage {
                key,
                stage: stage.to_string(),
            }
            .into());
        }
    }
    Ok(())
}
