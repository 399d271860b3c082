//! Core library components.
//!
//! Provisioning logic, the typed clients for the external CLIs, and
//! configuration handling. Nothing here prints; the `cli` module owns
//! user-facing output.

pub mod billing;
pub mod bootstrap;
pub mod cloud;
pub mod config;
pub mod constants;
pub mod env;
pub mod environment;
pub mod external;
pub mod map;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod provision;
pub mod retry;
pub mod secret_manager;
pub mod secrets;
