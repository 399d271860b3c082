//! Secret storage with version retention.
//!
//! Each save adds a version. With a retention count, the oldest enabled
//! versions are destroyed until no more than that many remain enabled.

use tracing::{debug, info};

use crate::core::secret_manager::SecretManager;
use crate::error::{require, Result, ValidationError};

/// Whether the save created the secret or added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Result of [`save_secret`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub outcome: SaveOutcome,
    /// Version ids destroyed by pruning, oldest first.
    pub destroyed: Vec<String>,
}

/// Store `value` as the newest version of `name` in `project`.
///
/// `retain` of `None` keeps every version. `Some(r)` with `r <= 0` is
/// rejected before anything is written.
pub fn save_secret(
    manager: &dyn SecretManager,
    project: &str,
    name: &str,
    value: &str,
    retain: Option<i64>,
) -> Result<SaveReport> {
    require(
        "save secret",
        &[("project", project), ("name", name), ("value", value)],
    )?;
    if let Some(count) = retain {
        if count <= 0 {
            return Err(ValidationError::InvalidRetention(count).into());
        }
    }

    let outcome = if manager.secret_exists(project, name)? {
        debug!(project, name, "adding secret version");
        manager.add_version(project, name, value)?;
        SaveOutcome::Updated
    } else {
        info!(project, name, "creating secret");
        manager.create_secret(project, name, value)?;
        SaveOutcome::Created
    };

    let destroyed = match retain {
        Some(count) => prune_versions(manager, project, name, count as usize)?,
        None => Vec::new(),
    };

    Ok(SaveReport { outcome, destroyed })
}

/// Destroy the oldest enabled versions until at most `retain` are enabled.
///
/// Disabled versions are neither counted nor destroyed.
pub fn prune_versions(
    manager: &dyn SecretManager,
    project: &str,
    name: &str,
    retain: usize,
) -> Result<Vec<String>> {
    let versions = manager.list_versions(project, name)?;
    let enabled: Vec<_> = versions.iter().filter(|v| v.is_enabled()).collect();
    let excess = enabled.len().saturating_sub(retain);

    let mut destroyed = Vec::with_capacity(excess);
    for version in enabled.into_iter().take(excess) {
        info!(project, name, version = version.id(), "destroying secret version");
        manager.destroy_version(project, name, version.id())?;
        destroyed.push(version.id().to_string());
    }

    debug!(project, name, kept = retain, destroyed = destroyed.len(), "pruning done");
    Ok(destroyed)
}
