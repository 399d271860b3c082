//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Create an azseed command running in the test directory.
    ///
    /// Colors are disabled and `AZSEED_*` variables from the outer
    /// environment are cleared.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("azseed").expect("failed to find azseed binary");
        cmd.current_dir(self.dir.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("AZSEED_CONFIG");
        cmd.env_remove("AZSEED_LOG");
        cmd
    }

    /// `azseed init` with every value supplied by flags, so no `az` call
    /// or prompt is needed.
    pub fn init_offline(&self, domain: &str) -> Output {
        self.cmd()
            .args(["--domain", domain, "init", "--parent-group", "tenant-root"])
            .args([
                "--billing-account",
                "acct-1",
                "--billing-profile",
                "prof-1",
                "--invoice-section",
                "sect-1",
            ])
            .output()
            .expect("failed to run azseed init")
    }

    /// Run azseed with arbitrary arguments.
    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run azseed")
    }
}
