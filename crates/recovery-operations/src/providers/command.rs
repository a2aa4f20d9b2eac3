use std::process::Command;

use tracing::debug;

use crate::Result;
use crate::error::OperationError;
use crate::traits::{CommandOutput, CommandRunner, render_command};

/// Runs commands as child processes of the current process.
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!(command = %render_command(program, args), "running command");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| OperationError::CommandSpawn {
                command: render_command(program, args),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
