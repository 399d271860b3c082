//! Shared runner for external command-line tools (`az`, `gcloud`).

use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{CommandError, Result};

/// A command-line program invoked with captured output.
#[derive(Debug, Clone, Copy)]
pub struct ExternalCli {
    program: &'static str,
}

impl ExternalCli {
    pub const fn new(program: &'static str) -> Self {
        Self { program }
    }

    /// Check that the program is on `PATH`.
    pub fn ensure_installed(&self) -> Result<()> {
        which::which(self.program).map_err(|_| CommandError::NotInstalled(self.program))?;
        Ok(())
    }

    /// Run and return trimmed stdout. Non-zero exit is an error.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args, None)?;
        self.stdout_or_error(output)
    }

    /// Run with `input` written to stdin.
    pub fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<String> {
        let output = self.output(args, Some(input))?;
        self.stdout_or_error(output)
    }

    /// Run as an existence probe: non-zero exit means absent.
    pub fn probe(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.output(args, None)?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            trace!(
                program = self.program,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "probe reported absent"
            );
            Ok(None)
        }
    }

    /// Run and deserialize stdout as JSON.
    pub fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let stdout = self.run(args)?;
        serde_json::from_str(&stdout).map_err(|e| {
            CommandError::UnexpectedOutput {
                program: self.program,
                reason: format!("invalid JSON: {}", e),
            }
            .into()
        })
    }

    fn output(&self, args: &[&str], input: Option<&str>) -> Result<Output> {
        self.ensure_installed()?;
        debug!(program = self.program, args = ?args, "invoking");

        let mut cmd = Command::new(self.program);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::NotInstalled(self.program).into()
            } else {
                crate::error::Error::Io(e)
            }
        })?;

        if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(data.as_bytes())?;
        }

        Ok(child.wait_with_output()?)
    }

    fn stdout_or_error(&self, output: Output) -> Result<String> {
        if !output.status.success() {
            return Err(CommandError::Failed {
                program: self.program,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| CommandError::UnexpectedOutput {
            program: self.program,
            reason: format!("invalid UTF-8: {}", e),
        })?;
        Ok(stdout.trim().to_string())
    }
}
