//! Apply command - provision every lifecycle stage.

use tracing::info;

use crate::cli::{output, Globals};
use crate::core::bootstrap::{self, StageReport};
use crate::core::cloud::AzCli;
use crate::core::config::Config;
use crate::core::provision::Provisioner;
use crate::core::retry::SystemClock;
use crate::error::Result;

/// Provision management groups, principals and grants for every stage.
pub fn execute(globals: &Globals) -> Result<()> {
    let config = Config::load(&globals.config_path, &globals.overrides)?;

    let cloud = AzCli::new();
    let clock = SystemClock;
    let provisioner = Provisioner::new(&cloud, &clock);

    output::header(&format!("Applying {}", config.domain));
    let report = bootstrap::apply(&config, &provisioner, print_stage)?;

    output::blank();
    output::kv("tenant      ", &report.account.tenant_id);
    output::kv("subscription", &report.account.subscription_id);

    let pending = report.pending();
    if pending > 0 {
        output::warn(&format!(
            "{} management group(s) still provisioning; rerun {} later",
            pending,
            output::cmd("azseed apply")
        ));
    } else {
        output::success("tenancy bootstrapped");
    }
    info!(pending, "apply finished");
    Ok(())
}

fn print_stage(report: &StageReport) {
    output::section(&report.stage);

    for (env, groups) in &report.management_groups {
        for (segment, group) in env.segments().zip(groups) {
            output::progress(&format!("management group {} ({})", segment, env));
            output::progress_done(group.state);
        }
    }

    output::progress(&format!(
        "resource group {}",
        bootstrap::resource_group_name(&report.stage)
    ));
    output::progress_done(report.resource_group.state);

    output::progress(&format!(
        "service principal {}",
        report.service_principal.app_id
    ));
    output::progress_done(report.service_principal_state);

    output::progress(&format!(
        "federated credential {}",
        report.federated_credential.id
    ));
    output::progress_done(report.federated_credential.state);

    output::progress("owner role assignment");
    output::progress_done(report.role_assignment.state);

    output::progress("billing role assignment");
    match &report.billing {
        Some(grant) => output::progress_done(grant.state),
        None => output::progress_done("skipped"),
    }
}
