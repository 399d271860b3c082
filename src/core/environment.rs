//! Lifecycle stages and stage-qualified environment paths.

use std::fmt;
use std::str::FromStr;

use crate::core::constants::{ENVIRONMENTS, LIFECYCLE_STAGES, SEED};
use crate::error::{Error, Result, ValidationError};

/// A `/`-delimited environment such as `development/sandbox`.
///
/// The first segment is always a recognized lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
}

impl Environment {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| -> Error {
            ValidationError::InvalidEnvironment {
                path: path.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if path.split('/').any(str::is_empty) {
            return Err(invalid("empty path segment"));
        }
        let stage = path.split('/').next().unwrap_or_default();
        if !LIFECYCLE_STAGES.contains(&stage) {
            return Err(invalid(&format!("'{}' is not a lifecycle stage", stage)));
        }

        Ok(Self {
            name: path.to_string(),
        })
    }

    /// Full environment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle stage (first segment).
    pub fn stage(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split('/')
    }

    /// True for the environment without a management-group hierarchy.
    pub fn is_seed(&self) -> bool {
        self.name == SEED
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// All provisioned environments.
pub fn all() -> Result<Vec<Environment>> {
    ENVIRONMENTS.iter().map(|e| Environment::parse(e)).collect()
}

/// Environments belonging to `stage`, in declaration order.
pub fn in_stage(stage: &str) -> Result<Vec<Environment>> {
    Ok(all()?.into_iter().filter(|e| e.stage() == stage).collect())
}

/// Validate a lifecycle stage name.
pub fn validate_stage(stage: &str) -> Result<()> {
    if LIFECYCLE_STAGES.contains(&stage) {
        Ok(())
    } else {
        Err(ValidationError::UnknownStage(stage.to_string()).into())
    }
}
