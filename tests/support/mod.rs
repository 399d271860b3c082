//! Test support utilities for azseed integration tests.
//!
//! Provides an isolated working directory and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with an isolated working directory.
///
/// Child processes run with `.current_dir()`, so the config file lands in
/// the temp dir and tests can run in parallel.
pub struct Test {
    /// Temporary working directory
    pub dir: TempDir,
}

impl Test {
    /// Create a new empty test environment.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    /// Create a test environment with a config file written by `init`.
    pub fn init() -> Self {
        let t = Self::new();
        let output = t.init_offline("example.com");
        assert!(
            output.status.success(),
            "Failed to initialize: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Create a test environment with the given config file contents.
    pub fn with_config(contents: &str) -> Self {
        let t = Self::new();
        std::fs::write(t.config_path(), contents).expect("failed to write config");
        t
    }

    /// Path of the default config file.
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("azseed.env")
    }

    /// Current config file contents.
    pub fn config(&self) -> String {
        std::fs::read_to_string(self.config_path()).expect("failed to read config")
    }
}
