//! Init command - write the configuration file.

use tracing::info;

use crate::cli::billing::{self, BillingArgs};
use crate::cli::{output, Globals};
use crate::core::cloud::{AzCli, CloudProvider};
use crate::core::constants::{keys, DEFAULT_LOCATION, LIFECYCLE_STAGES};
use crate::core::env::EnvFile;
use crate::core::map::NameValueMap;
use crate::error::{ConfigError, Result};

/// Stage map with an empty value per stage, for the operator to fill in.
fn empty_stage_map() -> NameValueMap {
    LIFECYCLE_STAGES.iter().map(|stage| (*stage, "")).collect()
}

/// Create or update the configuration file.
pub fn execute(
    globals: &Globals,
    parent_group: Option<String>,
    billing_args: &BillingArgs,
) -> Result<()> {
    let domain = globals
        .overrides
        .domain
        .clone()
        .filter(|d| !d.trim().is_empty())
        .ok_or(ConfigError::DomainRequired)?;
    let flag_scope = billing_args.scope()?;

    let mut file = EnvFile::load_or_empty(&globals.config_path)?;
    info!(path = %file.path().display(), domain = %domain, "initializing");

    let location = globals
        .overrides
        .location
        .clone()
        .or_else(|| file.get(keys::LOCATION))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

    file.set(keys::DOMAIN, &domain);
    file.set(keys::LOCATION, &location);

    let cloud = AzCli::new();

    let parent = match parent_group.or_else(|| {
        file.get(keys::MANAGEMENT_GROUP_PARENT)
            .filter(|p| !p.is_empty())
    }) {
        Some(parent) => parent,
        None => {
            output::progress("looking up tenant root group");
            let account = cloud.account()?;
            output::progress_done("ok");
            account.tenant_id
        }
    };
    file.set(keys::MANAGEMENT_GROUP_PARENT, &parent);

    for key in [keys::OIDC_ISSUERS, keys::SECRET_PROJECTS] {
        if !file.contains(key) {
            file.set(key, &empty_stage_map().to_string());
        }
    }

    let scope = match flag_scope.or_else(|| billing::stored_scope(&file)) {
        Some(scope) => scope,
        None => billing::prompt_scope(&cloud)?,
    };
    billing::write_scope(&mut file, &scope);

    file.save()?;

    output::success(&format!(
        "wrote {}",
        output::path(&file.path().display().to_string())
    ));
    output::kv("domain  ", &domain);
    output::kv("location", &location);
    output::kv("parent  ", &parent);
    output::kv("billing ", scope.id_path());
    output::blank();
    output::hint(&format!(
        "fill in {} and {}, then run: {}",
        keys::OIDC_ISSUERS,
        keys::SECRET_PROJECTS,
        output::cmd("azseed apply")
    ));

    Ok(())
}
