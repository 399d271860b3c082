//! Per-stage provisioning sequences.
//!
//! `apply` walks the lifecycle stages in order and, for each one, builds
//! the management-group hierarchy of its environments, the operator's
//! resource group and service principal, the federated credential, the
//! RBAC grant and, when configured, the billing grant.

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::core::cloud::{Account, CloudProvider, ServicePrincipal};
use crate::core::config::Config;
use crate::core::constants::{
    LIFECYCLE_STAGES, OPERATOR_PREFIX, OWNER_ROLE, SETTINGS_SECRET, SUBSCRIPTION_CREATOR_ROLE_ID,
};
use crate::core::environment::{self, Environment};
use crate::core::provision::{management_group_id, Provisioned, Provisioner, State};
use crate::core::secret_manager::SecretManager;
use crate::core::secrets::{save_secret, SaveReport};
use crate::error::{Error, Result, ValidationError};

/// Resource group holding a stage's operator resources.
pub fn resource_group_name(stage: &str) -> String {
    format!("{}-{}", OPERATOR_PREFIX, stage)
}

/// Display name of a stage's service principal.
pub fn service_principal_name(config: &Config, stage: &str) -> String {
    format!("{}-{}-{}", OPERATOR_PREFIX, stage, config.domain_slug())
}

pub fn federated_credential_name(stage: &str) -> String {
    format!("{}-workload-identity", stage)
}

/// Scope of the stage principal's Owner grant.
///
/// The seed operator manages the current subscription; the others manage
/// their stage's management group.
pub fn role_scope(stage: &str, account: &Account) -> String {
    if stage == crate::core::constants::SEED {
        format!("/subscriptions/{}", account.subscription_id)
    } else {
        management_group_id(stage)
    }
}

/// Credentials the operator needs for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSettings {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
}

impl StageSettings {
    /// `KEY=VALUE` lines, newline-joined.
    pub fn render(&self) -> Zeroizing<String> {
        Zeroizing::new(
            [
                format!("AZURE_SUBSCRIPTION_ID={}", self.subscription_id),
                format!("AZURE_TENANT_ID={}", self.tenant_id),
                format!("AZURE_CLIENT_ID={}", self.client_id),
                "USE_WORKLOAD_IDENTITY_AUTH=true".to_string(),
            ]
            .join("\n"),
        )
    }
}

/// Everything `apply` did for one stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: String,
    pub management_groups: Vec<(Environment, Vec<Provisioned>)>,
    pub resource_group: Provisioned,
    pub service_principal: ServicePrincipal,
    pub service_principal_state: State,
    pub federated_credential: Provisioned,
    pub role_assignment: Provisioned,
    /// `None` when no billing scope is configured.
    pub billing: Option<Provisioned>,
}

/// Result of [`apply`].
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub account: Account,
    pub stages: Vec<StageReport>,
}

impl ApplyReport {
    /// Management groups still provisioning.
    pub fn pending(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|s| &s.management_groups)
            .flat_map(|(_, groups)| groups)
            .filter(|g| g.state == State::Pending)
            .count()
    }
}

/// Provision every stage in order, calling `on_stage` as each one finishes.
pub fn apply<F>(
    config: &Config,
    provisioner: &Provisioner<'_>,
    mut on_stage: F,
) -> Result<ApplyReport>
where
    F: FnMut(&StageReport),
{
    config.validate_for_apply()?;
    let account = provisioner.cloud().account()?;

    let mut stages = Vec::with_capacity(LIFECYCLE_STAGES.len());
    for stage in LIFECYCLE_STAGES {
        let report = apply_stage(config, provisioner, &account, stage)?;
        on_stage(&report);
        stages.push(report);
    }
    Ok(ApplyReport { account, stages })
}

/// Provision one lifecycle stage.
pub fn apply_stage(
    config: &Config,
    provisioner: &Provisioner<'_>,
    account: &Account,
    stage: &str,
) -> Result<StageReport> {
    environment::validate_stage(stage)?;
    info!(stage, "applying stage");

    let mut management_groups = Vec::new();
    for env in environment::in_stage(stage)? {
        let groups =
            provisioner.ensure_management_group_path(&env, &config.management_group_parent)?;
        management_groups.push((env, groups));
    }

    let resource_group =
        provisioner.ensure_resource_group(&resource_group_name(stage), &config.location)?;

    let (service_principal, service_principal_state) =
        provisioner.ensure_service_principal(&service_principal_name(config, stage))?;

    let federated_credential = provisioner.ensure_federated_credential(
        &service_principal.app_id,
        &federated_credential_name(stage),
        config.issuer(stage),
    )?;

    let role_assignment = provisioner.ensure_role_assignment(
        &service_principal.object_id,
        OWNER_ROLE,
        &role_scope(stage, account),
    )?;

    let billing = match &config.billing {
        Some(scope) => Some(provisioner.ensure_billing_role_assignment(
            scope,
            &service_principal.object_id,
            &account.tenant_id,
            SUBSCRIPTION_CREATOR_ROLE_ID,
        )?),
        None => {
            warn!(stage, "billing scope not configured, skipping billing role");
            None
        }
    };

    Ok(StageReport {
        stage: stage.to_string(),
        management_groups,
        resource_group,
        service_principal,
        service_principal_state,
        federated_credential,
        role_assignment,
        billing,
    })
}

/// Look up a stage's settings without creating anything.
pub fn stage_settings(
    config: &Config,
    cloud: &dyn CloudProvider,
    account: &Account,
    stage: &str,
) -> Result<StageSettings> {
    environment::validate_stage(stage)?;
    let name = service_principal_name(config, stage);
    let sp = cloud
        .find_service_principal(&name)?
        .ok_or_else(|| Error::NotFound(format!("service principal {}", name)))?;

    Ok(StageSettings {
        subscription_id: account.subscription_id.clone(),
        tenant_id: account.tenant_id.clone(),
        client_id: sp.app_id,
    })
}

/// Outcome of saving one stage's settings.
#[derive(Debug, Clone)]
pub struct SecretSave {
    pub stage: String,
    pub project: String,
    pub report: SaveReport,
}

/// Mirror every stage's settings into its secret project.
pub fn save_secrets(
    config: &Config,
    cloud: &dyn CloudProvider,
    manager: &dyn SecretManager,
    retain: Option<i64>,
) -> Result<Vec<SecretSave>> {
    if let Some(count) = retain.filter(|c| *c <= 0) {
        return Err(ValidationError::InvalidRetention(count).into());
    }
    config.validate_for_secrets()?;
    let account = cloud.account()?;

    let mut saved = Vec::new();
    for stage in LIFECYCLE_STAGES {
        let settings = stage_settings(config, cloud, &account, stage)?;
        let project = config.secret_project(stage);
        let payload = settings.render();
        let report = save_secret(manager, project, SETTINGS_SECRET, &payload, retain)?;
        saved.push(SecretSave {
            stage: stage.to_string(),
            project: project.to_string(),
            report,
        });
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::billing::BillingScope;
    use crate::core::config::{Config, Overrides};
    use crate::core::env::EnvFile;
    use crate::core::mock::{MockClock, MockCloud, MockSecretManager};
    use crate::core::secret_manager::VersionState;
    use crate::core::secrets::SaveOutcome;
    use tempfile::TempDir;

    fn config(billing: bool) -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let mut file = EnvFile::load_or_empty(tmp.path().join("azseed.env")).unwrap();
        file.set("DOMAIN", "example.com");
        file.set("MANAGEMENT_GROUP_PARENT", "tenant-root");
        file.set(
            "OIDC_ISSUERS",
            r#"("seed=https://seed" "development=https://dev" "production=https://prod")"#,
        );
        file.set(
            "SECRET_PROJECTS",
            r#"("seed=seed-p" "development=dev-p" "production=prod-p")"#,
        );
        if billing {
            file.set("BILLING_ACCOUNT_ID", "acct");
            file.set("BILLING_PROFILE_ID", "prof");
            file.set("INVOICE_SECTION_ID", "sect");
        }
        let config = Config::from_file(&file, &Overrides::default()).unwrap();
        (tmp, config)
    }

    #[test]
    fn test_render_settings() {
        let settings = StageSettings {
            subscription_id: "sub".into(),
            tenant_id: "ten".into(),
            client_id: "cli".into(),
        };
        assert_eq!(
            settings.render().as_str(),
            "AZURE_SUBSCRIPTION_ID=sub\nAZURE_TENANT_ID=ten\nAZURE_CLIENT_ID=cli\nUSE_WORKLOAD_IDENTITY_AUTH=true"
        );
    }

    #[test]
    fn test_names() {
        let (_tmp, config) = config(false);
        assert_eq!(resource_group_name("seed"), "azureserviceoperator-seed");
        assert_eq!(
            service_principal_name(&config, "production"),
            "azureserviceoperator-production-example-com"
        );
        let account = Account {
            subscription_id: "s1".into(),
            tenant_id: "t".into(),
        };
        assert_eq!(role_scope("seed", &account), "/subscriptions/s1");
        assert_eq!(
            role_scope("development", &account),
            "/providers/Microsoft.Management/managementGroups/development"
        );
    }

    #[test]
    fn test_apply_provisions_every_stage() {
        let (_tmp, config) = config(true);
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let provisioner = Provisioner::new(&cloud, &clock);

        let mut seen = Vec::new();
        let report = apply(&config, &provisioner, |s| seen.push(s.stage.clone())).unwrap();
        assert_eq!(seen, ["seed", "development", "production"]);
        assert_eq!(report.account.tenant_id, "tenant-0001");
        assert_eq!(report.pending(), 0);
        let reports = report.stages;
        assert!(reports
            .iter()
            .all(|r| r.billing.as_ref().map(|b| b.state) == Some(State::Created)));
        assert!(reports
            .iter()
            .all(|r| r.service_principal_state == State::Created));

        assert_eq!(
            cloud.management_group_parent("development").as_deref(),
            Some("tenant-root")
        );
        assert_eq!(
            cloud.management_group_parent("sandbox").as_deref(),
            Some("development")
        );
        assert_eq!(cloud.management_group_parent("live").as_deref(), Some("production"));

        let seed = &reports[0];
        assert!(seed.management_groups.iter().all(|(_, g)| g.is_empty()));

        let billing = cloud.billing_assignments();
        assert_eq!(billing.len(), 3);
        assert_eq!(billing[0].0, BillingScope::new("acct", "prof", "sect"));
        assert_eq!(billing[0].1.principal_tenant_id, "tenant-0001");
    }

    #[test]
    fn test_apply_twice_creates_nothing_new() {
        let (_tmp, config) = config(true);
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let provisioner = Provisioner::new(&cloud, &clock);

        apply(&config, &provisioner, |_| {}).unwrap();
        cloud.clear_calls();
        let reports = apply(&config, &provisioner, |_| {}).unwrap().stages;

        assert!(cloud.create_calls().is_empty(), "{:?}", cloud.create_calls());
        assert!(reports.iter().all(|r| r.resource_group.state == State::Existing));
        assert!(reports
            .iter()
            .all(|r| r.billing.as_ref().map(|b| b.state) == Some(State::Existing)));
        assert_eq!(cloud.billing_assignments().len(), 3);
    }

    #[test]
    fn test_apply_without_billing_skips_grant() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        let provisioner = Provisioner::new(&cloud, &clock);

        let reports = apply(&config, &provisioner, |_| {}).unwrap().stages;
        assert!(reports.iter().all(|r| r.billing.is_none()));
        assert!(!cloud.calls().iter().any(|c| c.contains("billing")));
    }

    #[test]
    fn test_apply_counts_pending_groups() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        cloud.management_group_lag.set(u32::MAX);
        let clock = MockClock::new();
        let provisioner = Provisioner::new(&cloud, &clock);

        let report = apply(&config, &provisioner, |_| {}).unwrap();
        // Per stage: the stage group and both leaf groups stay pending.
        assert_eq!(report.pending(), 6);
    }

    #[test]
    fn test_apply_stops_on_external_failure() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        *cloud.fail_on.borrow_mut() = Some("create_service_principal");
        let clock = MockClock::new();
        let provisioner = Provisioner::new(&cloud, &clock);

        assert!(apply(&config, &provisioner, |_| {}).is_err());
        // Seed resource group was created before the failure and is left in place.
        assert!(cloud
            .calls()
            .contains(&"create_resource_group:azureserviceoperator-seed@eastus".to_string()));
    }

    #[test]
    fn test_stage_settings_requires_applied_principal() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        let account = cloud.account().unwrap();
        assert!(matches!(
            stage_settings(&config, &cloud, &account, "seed"),
            Err(Error::NotFound(_))
        ));
        assert!(cloud.create_calls().is_empty());
    }

    #[test]
    fn test_save_secrets_writes_each_stage_project() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        apply(&config, &Provisioner::new(&cloud, &clock), |_| {}).unwrap();

        let sm = MockSecretManager::new();
        let saved = save_secrets(&config, &cloud, &sm, Some(1)).unwrap();
        assert_eq!(saved.len(), 3);
        assert!(saved.iter().all(|s| s.report.outcome == SaveOutcome::Created));

        let value = sm.latest_value("dev-p", SETTINGS_SECRET).unwrap();
        assert!(value.starts_with("AZURE_SUBSCRIPTION_ID=sub-0001\n"));
        assert!(value.ends_with("USE_WORKLOAD_IDENTITY_AUTH=true"));

        let again = save_secrets(&config, &cloud, &sm, Some(1)).unwrap();
        assert!(again.iter().all(|s| s.report.outcome == SaveOutcome::Updated));
        assert_eq!(again[0].report.destroyed, vec!["1"]);
        assert_eq!(
            sm.version_ids("seed-p", SETTINGS_SECRET, VersionState::Enabled),
            vec!["2"]
        );
    }

    #[test]
    fn test_save_secrets_stops_on_secret_manager_failure() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        let clock = MockClock::new();
        apply(&config, &Provisioner::new(&cloud, &clock), |_| {}).unwrap();

        let sm = MockSecretManager::new();
        *sm.fail_on.borrow_mut() = Some("create_secret");
        assert!(matches!(
            save_secrets(&config, &cloud, &sm, None),
            Err(Error::Command(_))
        ));
        // Seed failed first; later stages were never attempted.
        assert!(!sm.calls().iter().any(|c| c.contains("dev-p")));
    }

    #[test]
    fn test_save_secrets_rejects_bad_retention_first() {
        let (_tmp, config) = config(false);
        let cloud = MockCloud::new();
        let sm = MockSecretManager::new();
        assert!(save_secrets(&config, &cloud, &sm, Some(0)).is_err());
        assert!(cloud.calls().is_empty());
        assert!(sm.calls().is_empty());
    }
}
