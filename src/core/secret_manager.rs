//! Google Secret Manager client.
//!
//! [`SecretManager`] covers the describe / create / add-version /
//! list-versions / destroy-version operations. [`GcloudSecrets`] implements
//! it with the `gcloud` CLI.
//!
//! ## Requirements
//!
//! - `gcloud` CLI installed and authenticated
//! - `secretmanager.admin` (or equivalent) on each target project

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::external::ExternalCli;
use crate::error::Result;

/// Version lifecycle state as reported by Secret Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    Enabled,
    Disabled,
    Destroyed,
    #[serde(other)]
    Unknown,
}

/// One version of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersion {
    /// Full resource name: `projects/*/secrets/*/versions/*`.
    pub name: String,
    pub state: VersionState,
    pub create_time: DateTime<Utc>,
}

impl SecretVersion {
    /// Version id (last path segment of the resource name).
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn is_enabled(&self) -> bool {
        self.state == VersionState::Enabled
    }
}

/// Typed interface to the secret store.
pub trait SecretManager {
    fn secret_exists(&self, project: &str, name: &str) -> Result<bool>;

    /// Create the secret with `value` as its first version.
    fn create_secret(&self, project: &str, name: &str, value: &str) -> Result<()>;

    fn add_version(&self, project: &str, name: &str, value: &str) -> Result<()>;

    /// Enabled and disabled versions, oldest first.
    fn list_versions(&self, project: &str, name: &str) -> Result<Vec<SecretVersion>>;

    fn destroy_version(&self, project: &str, name: &str, version: &str) -> Result<()>;
}

/// [`SecretManager`] backed by `gcloud secrets`.
#[derive(Debug, Clone, Copy)]
pub struct GcloudSecrets {
    cli: ExternalCli,
}

impl GcloudSecrets {
    pub fn new() -> Self {
        Self {
            cli: ExternalCli::new("gcloud"),
        }
    }
}

impl Default for GcloudSecrets {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretManager for GcloudSecrets {
    fn secret_exists(&self, project: &str, name: &str) -> Result<bool> {
        let found = self.cli.probe(&[
            "secrets",
            "describe",
            name,
            "--project",
            project,
            "--format",
            "value(name)",
        ])?;
        Ok(found.is_some())
    }

    fn create_secret(&self, project: &str, name: &str, value: &str) -> Result<()> {
        self.cli.run_with_stdin(
            &[
                "secrets",
                "create",
                name,
                "--project",
                project,
                "--replication-policy",
                "automatic",
                "--data-file",
                "-",
            ],
            value,
        )?;
        Ok(())
    }

    fn add_version(&self, project: &str, name: &str, value: &str) -> Result<()> {
        self.cli.run_with_stdin(
            &[
                "secrets",
                "versions",
                "add",
                name,
                "--project",
                project,
                "--data-file",
                "-",
            ],
            value,
        )?;
        Ok(())
    }

    fn list_versions(&self, project: &str, name: &str) -> Result<Vec<SecretVersion>> {
        let mut versions: Vec<SecretVersion> = self.cli.run_json(&[
            "secrets",
            "versions",
            "list",
            name,
            "--project",
            project,
            "--filter",
            "state:(ENABLED OR DISABLED)",
            "--sort-by",
            "createTime",
            "--format",
            "json",
        ])?;
        versions.sort_by_key(|v| v.create_time);
        Ok(versions)
    }

    fn destroy_version(&self, project: &str, name: &str, version: &str) -> Result<()> {
        self.cli.run(&[
            "secrets",
            "versions",
            "destroy",
            version,
            "--secret",
            name,
            "--project",
            project,
            "--quiet",
        ])?;
        Ok(())
    }
}
