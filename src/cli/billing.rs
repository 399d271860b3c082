//! Billing scope selection: flags, the interactive menu, and the
//! set-billing-scope command.

use std::io::{self, IsTerminal};

use clap::Args;
use dialoguer::Select;

use crate::cli::{output, Globals};
use crate::core::billing::{self, BillingScope};
use crate::core::cloud::{AzCli, CloudProvider};
use crate::core::constants::keys;
use crate::core::env::EnvFile;
use crate::error::{missing, BillingError, Result};

/// Billing ids given on the command line. All three or none.
#[derive(Args, Debug, Clone, Default)]
pub struct BillingArgs {
    /// Billing account id (skips the menu together with the other two)
    #[arg(long)]
    pub billing_account: Option<String>,

    /// Billing profile id
    #[arg(long)]
    pub billing_profile: Option<String>,

    /// Invoice section id
    #[arg(long)]
    pub invoice_section: Option<String>,
}

impl BillingArgs {
    /// The scope if all three flags were given, `None` if none were.
    pub fn scope(&self) -> Result<Option<BillingScope>> {
        let given = [
            ("billing-account", &self.billing_account),
            ("billing-profile", &self.billing_profile),
            ("invoice-section", &self.invoice_section),
        ];
        if given.iter().all(|(_, v)| v.is_none()) {
            return Ok(None);
        }
        if let Some(flag) = given
            .iter()
            .find(|(_, v)| v.as_deref().map_or(true, str::is_empty))
            .map(|(flag, _)| *flag)
        {
            return Err(missing("billing scope", flag));
        }
        Ok(BillingScope::from_parts(
            self.billing_account.clone(),
            self.billing_profile.clone(),
            self.invoice_section.clone(),
        ))
    }
}

/// Ask the operator to pick a scope from what the account can see.
pub fn prompt_scope(cloud: &dyn CloudProvider) -> Result<BillingScope> {
    if !io::stdin().is_terminal() {
        return Err(BillingError::NotInteractive.into());
    }

    billing::select_scope(cloud, |prompt, choices| {
        let labels: Vec<String> = choices.iter().map(|c| c.label()).collect();
        Ok(Select::new()
            .with_prompt(prompt)
            .items(&labels)
            .default(0)
            .interact()?)
    })
}

/// Store a scope in the config file (not saved).
pub fn write_scope(file: &mut EnvFile, scope: &BillingScope) {
    file.set(keys::BILLING_ACCOUNT_ID, &scope.account);
    file.set(keys::BILLING_PROFILE_ID, &scope.profile);
    file.set(keys::INVOICE_SECTION_ID, &scope.invoice_section);
}

/// Scope already stored in the file, if complete.
pub fn stored_scope(file: &EnvFile) -> Option<BillingScope> {
    BillingScope::from_parts(
        file.get(keys::BILLING_ACCOUNT_ID),
        file.get(keys::BILLING_PROFILE_ID),
        file.get(keys::INVOICE_SECTION_ID),
    )
}

/// `set-billing-scope`: choose a scope and write it to the config file.
pub fn set_scope(globals: &Globals, args: &BillingArgs) -> Result<()> {
    let mut file = EnvFile::load(&globals.config_path)?;

    let scope = match args.scope()? {
        Some(scope) => scope,
        None => prompt_scope(&AzCli::new())?,
    };

    write_scope(&mut file, &scope);
    file.save()?;

    output::success(&format!(
        "billing scope set in {}",
        output::path(&file.path().display().to_string())
    ));
    output::kv("scope", scope.id_path());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: Option<&str>, p: Option<&str>, s: Option<&str>) -> BillingArgs {
        BillingArgs {
            billing_account: a.map(String::from),
            billing_profile: p.map(String::from),
            invoice_section: s.map(String::from),
        }
    }

    #[test]
    fn test_no_flags_means_prompt() {
        assert_eq!(args(None, None, None).scope().unwrap(), None);
    }

    #[test]
    fn test_all_flags_build_scope() {
        assert_eq!(
            args(Some("a"), Some("p"), Some("s")).scope().unwrap(),
            Some(BillingScope::new("a", "p", "s"))
        );
    }

    #[test]
    fn test_partial_flags_name_the_missing_one() {
        let err = args(Some("a"), None, Some("s")).scope().unwrap_err();
        assert!(err.to_string().contains("billing-profile"));
    }
}
