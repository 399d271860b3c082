//! azseed - bootstrap an Azure tenancy for Azure Service Operator.

use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use azseed::cli::output;
use azseed::cli::{execute, Cli};
use azseed::error::{BillingError, CommandError, ConfigError, Error};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("AZSEED_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("azseed=debug")
        } else {
            EnvFilter::new("azseed=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .init();

    if let Err(e) = execute(cli) {
        output::error(&e.to_string());

        match &e {
            Error::Config(ConfigError::DomainRequired) => {
                eprintln!("{}", Cli::command().render_usage());
            }
            Error::Config(ConfigError::NotInitialized(_)) => {
                output::hint("run: azseed --domain <DOMAIN> init");
            }
            Error::Config(ConfigError::MissingStage { .. }) => {
                output::hint("edit the config file and fill in every stage");
            }
            Error::Billing(BillingError::NotInteractive) => {
                output::hint(
                    "pass --billing-account, --billing-profile and --invoice-section",
                );
            }
            Error::Command(CommandError::NotInstalled("az")) => {
                output::hint("install the Azure CLI and run: az login");
            }
            Error::Command(CommandError::NotInstalled("gcloud")) => {
                output::hint("install the Google Cloud SDK and run: gcloud auth login");
            }
            Error::NotFound(_) => {
                output::hint("run: azseed apply");
            }
            _ => {}
        }
        std::process::exit(1);
    }
}
