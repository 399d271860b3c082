//! Output command - print per-stage operator settings.

use crate::cli::{output, Globals};
use crate::core::bootstrap;
use crate::core::cloud::{AzCli, CloudProvider};
use crate::core::config::Config;
use crate::core::constants::{keys, LIFECYCLE_STAGES};
use crate::core::environment;
use crate::error::{ConfigError, Result};

/// Print the settings of every stage, or only `stage`.
///
/// Nothing is created; a stage that hasn't been applied is an error.
pub fn execute(globals: &Globals, stage: Option<&str>) -> Result<()> {
    let config = Config::load(&globals.config_path, &globals.overrides)?;
    if config.domain.is_empty() {
        return Err(ConfigError::MissingKey(keys::DOMAIN).into());
    }

    let stages: Vec<&str> = match stage {
        Some(stage) => {
            environment::validate_stage(stage)?;
            vec![stage]
        }
        None => LIFECYCLE_STAGES.to_vec(),
    };

    let cloud = AzCli::new();
    let account = cloud.account()?;

    for (i, stage) in stages.iter().enumerate() {
        let settings = bootstrap::stage_settings(&config, &cloud, &account, stage)?;
        if stages.len() > 1 {
            if i > 0 {
                output::blank();
            }
            output::data(&format!("# {}", stage));
        }
        output::data(&settings.render());
    }
    Ok(())
}
