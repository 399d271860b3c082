//! Command-line interface.

pub mod apply;
pub mod billing;
pub mod completions;
pub mod init;
pub mod output;
pub mod save_secrets;
pub mod show;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::Overrides;
use crate::core::constants::CONFIG_FILE;
use crate::error::Result;

pub use billing::BillingArgs;

/// azseed - bootstrap an Azure tenancy for Azure Service Operator.
#[derive(Parser)]
#[command(
    name = "azseed",
    about = "Bootstrap Azure management groups, service principals and workload identity",
    version
)]
pub struct Cli {
    /// Organization domain (e.g. example.com)
    #[arg(short, long, global = true)]
    pub domain: Option<String>,

    /// Azure region for resource groups
    #[arg(short, long, global = true)]
    pub location: Option<String>,

    /// Configuration file
    #[arg(long, global = true, env = "AZSEED_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Write the configuration file and choose a billing scope
    Init {
        /// Parent management group (defaults to the tenant root group)
        #[arg(long)]
        parent_group: Option<String>,

        #[command(flatten)]
        billing: BillingArgs,
    },

    /// Create management groups, service principals and role assignments
    Apply,

    /// Print the operator settings for each lifecycle stage
    Output {
        /// Only print this stage
        #[arg(long)]
        stage: Option<String>,
    },

    /// Store the operator settings in each stage's Secret Manager project
    SaveSecrets {
        /// Keep at most this many enabled secret versions
        #[arg(long, allow_negative_numbers = true)]
        retain: Option<i64>,
    },

    /// Choose the billing account, profile and invoice section
    SetBillingScope {
        #[command(flatten)]
        billing: BillingArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub config_path: PathBuf,
    pub overrides: Overrides,
}

/// Execute a command.
pub fn execute(cli: Cli) -> Result<()> {
    let globals = Globals {
        config_path: cli.config,
        overrides: Overrides {
            domain: cli.domain,
            location: cli.location,
        },
    };

    match cli.command {
        Command::Init {
            parent_group,
            billing,
        } => init::execute(&globals, parent_group, &billing),
        Command::Apply => apply::execute(&globals),
        Command::Output { stage } => show::execute(&globals, stage.as_deref()),
        Command::SaveSecrets { retain } => save_secrets::execute(&globals, retain),
        Command::SetBillingScope { billing } => billing::set_scope(&globals, &billing),
        Command::Completions { shell } => completions::execute(shell),
    }
}
