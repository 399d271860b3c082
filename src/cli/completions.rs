//! Completions command.
//!
//! Writes a completion script for the requested shell to stdout, e.g.
//! `azseed completions zsh > ~/.zfunc/_azseed`.

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::debug;

use crate::cli::Cli;
use crate::error::Result;

/// Generate shell completions for the `azseed` command tree.
pub fn execute(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    debug!(%shell, bin = %bin, "generating completions");

    generate(shell, &mut cmd, bin, &mut io::stdout());
    Ok(())
}
