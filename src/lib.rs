//! azseed - bootstrap an Azure tenancy for Azure Service Operator.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/                  # Command-line interface
//! │   ├── init              # Write azseed.env, pick a billing scope
//! │   ├── apply             # Provision every lifecycle stage
//! │   ├── show              # Print per-stage operator settings
//! │   ├── save_secrets      # Mirror settings into Secret Manager
//! │   ├── billing           # Billing menu and set-billing-scope
//! │   └── output            # Shared terminal output helpers
//! └── core/                 # Core library components
//!     ├── config            # Config struct from file + flags
//!     ├── env               # KEY=VALUE file editing
//!     ├── map               # Shell-array name-value map
//!     ├── environment       # Lifecycle stages and environment paths
//!     ├── cloud             # CloudProvider trait, az implementation
//!     ├── secret_manager    # SecretManager trait, gcloud implementation
//!     ├── external          # External CLI runner
//!     ├── provision         # Idempotent ensure_* operations
//!     ├── retry             # Bounded polling with injectable clock
//!     ├── secrets           # Secret version retention
//!     ├── billing           # Billing scope and role payload
//!     ├── bootstrap         # Per-stage sequences
//!     └── mock              # In-memory fakes (tests, `mock` feature)
//! ```

pub mod cli;
pub mod core;
pub mod error;
