//! Billing scope selection and billing role assignment.
//!
//! A scope is the account / profile / invoice section triple that new
//! subscriptions are billed to. Stage principals get the subscription
//! creator role on the invoice section so the operator can create
//! subscriptions there.

use serde::Serialize;
use tracing::{debug, info};

use crate::core::cloud::{BillingChoice, CloudProvider};
use crate::core::constants::{BILLING_API_VERSION, MANAGEMENT_ENDPOINT};
use crate::error::{require, BillingError, Result};

/// Billing account, profile and invoice section ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingScope {
    pub account: String,
    pub profile: String,
    pub invoice_section: String,
}

impl BillingScope {
    pub fn new(
        account: impl Into<String>,
        profile: impl Into<String>,
        invoice_section: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            profile: profile.into(),
            invoice_section: invoice_section.into(),
        }
    }

    /// Build a scope only when all three parts are present and non-empty.
    pub fn from_parts(
        account: Option<String>,
        profile: Option<String>,
        invoice_section: Option<String>,
    ) -> Option<Self> {
        match (account, profile, invoice_section) {
            (Some(a), Some(p), Some(s)) if !a.is_empty() && !p.is_empty() && !s.is_empty() => {
                Some(Self::new(a, p, s))
            }
            _ => None,
        }
    }

    /// `billingAccounts/{a}/billingProfiles/{p}/invoiceSections/{s}`
    pub fn id_path(&self) -> String {
        format!(
            "billingAccounts/{}/billingProfiles/{}/invoiceSections/{}",
            self.account, self.profile, self.invoice_section
        )
    }

    /// Endpoint for `createBillingRoleAssignment` on this invoice section.
    pub fn create_role_assignment_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.Billing/{}/createBillingRoleAssignment?api-version={}",
            MANAGEMENT_ENDPOINT,
            self.id_path(),
            BILLING_API_VERSION
        )
    }

    /// Endpoint listing the role assignments on this invoice section.
    pub fn role_assignments_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.Billing/{}/billingRoleAssignments?api-version={}",
            MANAGEMENT_ENDPOINT,
            self.id_path(),
            BILLING_API_VERSION
        )
    }

    /// Fully qualified billing role definition id within this scope.
    pub fn role_definition_id(&self, role_id: &str) -> String {
        format!(
            "/providers/Microsoft.Billing/{}/billingRoleDefinitions/{}",
            self.id_path(),
            role_id
        )
    }

    /// Request body granting `role_id` to a principal.
    pub fn role_assignment(
        &self,
        object_id: &str,
        tenant_id: &str,
        role_id: &str,
    ) -> Result<BillingRoleAssignment> {
        require(
            "billing role assignment",
            &[
                ("object id", object_id),
                ("tenant id", tenant_id),
                ("role id", role_id),
                ("billing account", &self.account),
                ("billing profile", &self.profile),
                ("invoice section", &self.invoice_section),
            ],
        )?;
        Ok(BillingRoleAssignment {
            principal_id: object_id.to_string(),
            principal_tenant_id: tenant_id.to_string(),
            role_definition_id: self.role_definition_id(role_id),
        })
    }
}

/// Body of `createBillingRoleAssignment`. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRoleAssignment {
    pub principal_id: String,
    pub principal_tenant_id: String,
    pub role_definition_id: String,
}

impl BillingRoleAssignment {
    /// Role definition id without the scope prefix.
    pub fn role_id(&self) -> &str {
        self.role_definition_id
            .rsplit('/')
            .next()
            .unwrap_or(&self.role_definition_id)
    }
}

/// Walk accounts, profiles and invoice sections, asking `choose` at each
/// level with more than one option.
///
/// `choose` receives a prompt and the options and returns the index picked.
pub fn select_scope<F>(cloud: &dyn CloudProvider, mut choose: F) -> Result<BillingScope>
where
    F: FnMut(&str, &[BillingChoice]) -> Result<usize>,
{
    let accounts = cloud.billing_accounts()?;
    let account = pick("billing accounts", "Billing account", &accounts, &mut choose)?;

    let profiles = cloud.billing_profiles(&account)?;
    let profile = pick("billing profiles", "Billing profile", &profiles, &mut choose)?;

    let sections = cloud.invoice_sections(&account, &profile)?;
    let section = pick("invoice sections", "Invoice section", &sections, &mut choose)?;

    let scope = BillingScope::new(account, profile, section);
    info!(scope = %scope.id_path(), "billing scope selected");
    Ok(scope)
}

fn pick<F>(
    level: &'static str,
    prompt: &str,
    choices: &[BillingChoice],
    choose: &mut F,
) -> Result<String>
where
    F: FnMut(&str, &[BillingChoice]) -> Result<usize>,
{
    let index = match choices.len() {
        0 => return Err(BillingError::NoChoices(level).into()),
        1 => {
            debug!(level, choice = %choices[0].name, "single option, selecting automatically");
            0
        }
        _ => choose(prompt, choices)?,
    };

    choices
        .get(index)
        .map(|c| c.name.clone())
        .ok_or_else(|| BillingError::NoChoices(level).into())
}
