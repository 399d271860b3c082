//! Save-secrets command - mirror operator settings into Secret Manager.

use crate::cli::{output, Globals};
use crate::core::bootstrap;
use crate::core::cloud::AzCli;
use crate::core::config::Config;
use crate::core::constants::SETTINGS_SECRET;
use crate::core::secret_manager::GcloudSecrets;
use crate::core::secrets::SaveOutcome;
use crate::error::Result;

/// Save every stage's settings, pruning to `retain` versions if given.
pub fn execute(globals: &Globals, retain: Option<i64>) -> Result<()> {
    let config = Config::load(&globals.config_path, &globals.overrides)?;

    let saved =
        bootstrap::save_secrets(&config, &AzCli::new(), &GcloudSecrets::new(), retain)?;

    for entry in &saved {
        let verb = match entry.report.outcome {
            SaveOutcome::Created => "created",
            SaveOutcome::Updated => "updated",
        };
        output::success(&format!(
            "{}: {} {} in {}",
            entry.stage, verb, SETTINGS_SECRET, entry.project
        ));
        if !entry.report.destroyed.is_empty() {
            output::kv("destroyed versions", entry.report.destroyed.join(", "));
        }
    }
    Ok(())
}
