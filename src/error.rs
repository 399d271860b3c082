//! Error types for azseed.
//!
//! One top-level [`Error`] wraps a small enum per concern so `main` can map
//! specific failures to hints.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration file and flag errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not initialized: {} does not exist", .0.display())]
    NotInitialized(PathBuf),

    #[error("an organization domain is required (--domain)")]
    DomainRequired,

    #[error("missing configuration value: {0}")]
    MissingKey(&'static str),

    #[error("{key} has no entry for lifecycle stage '{stage}'")]
    MissingStage { key: &'static str, stage: String },

    #[error("{key} is not a valid array: {reason}")]
    InvalidArray { key: String, reason: String },

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),
}

/// Local input validation errors. Nothing external has been invoked yet.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{operation}: missing required parameter '{parameter}'")]
    MissingParameter {
        operation: &'static str,
        parameter: &'static str,
    },

    #[error("invalid environment '{path}': {reason}")]
    InvalidEnvironment { path: String, reason: String },

    #[error("unknown lifecycle stage: {0}")]
    UnknownStage(String),

    #[error("retention count must be at least 1, got {0}")]
    InvalidRetention(i64),
}

/// Failures invoking an external CLI.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0} command not found")]
    NotInstalled(&'static str),

    #[error("{program} failed with exit code {code}: {stderr}")]
    Failed {
        program: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("unexpected output from {program}: {reason}")]
    UnexpectedOutput {
        program: &'static str,
        reason: String,
    },
}

/// Billing scope selection errors.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("no {0} available to choose from")]
    NoChoices(&'static str),

    #[error("billing selection requires an interactive terminal")]
    NotInteractive,
}

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for a missing-parameter validation error.
pub(crate) fn missing(operation: &'static str, parameter: &'static str) -> Error {
    ValidationError::MissingParameter {
        operation,
        parameter,
    }
    .into()
}

/// Fail with [`ValidationError::MissingParameter`] on the first empty value.
pub(crate) fn require(operation: &'static str, params: &[(&'static str, &str)]) -> Result<()> {
    for (name, value) in params {
        if value.trim().is_empty() {
            return Err(missing(operation, name));
        }
    }
    Ok(())
}
