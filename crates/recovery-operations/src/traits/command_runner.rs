use crate::{OperationError, Result};

/// Captured result of an external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs shell utilities on behalf of providers.
pub trait CommandRunner: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned. A non-zero exit
    /// status is not an error at this level.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run and require a zero exit status.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::CommandFailed` on a non-zero exit status.
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(program, args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(OperationError::CommandFailed {
                command: render_command(program, args),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

pub(crate) fn render_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
