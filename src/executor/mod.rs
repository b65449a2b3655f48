//! Command execution abstraction for the installer.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Result of command execution
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Live implementation using `std::process::Command`
//! - [`SimulatedExecutor`]: Dry-run implementation that never mutates the system
//!
//! The executor is chosen once at startup and passed explicitly into every
//! collaborator, which flips the whole pipeline between live and simulated
//! modes without any further branching.

mod pipe;
mod real;
mod simulated;

use anyhow::Result;
use camino::Utf8Path;
use tracing::warn;

use crate::error::InstallerError;

pub(crate) use pipe::panic_message;
pub use real::RealCommandExecutor;
pub use simulated::{SIMULATED_LSBLK_JSON, SimulatedExecutor};

/// Formats string arguments into a space-separated string.
///
/// Used by error messages and log output to consistently format
/// command vectors (e.g., `parted -s /dev/sda mklabel gpt`).
pub(crate) fn format_command(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Specification for a command to be executed
#[derive(Clone)]
pub struct CommandSpec {
    /// The program to execute (e.g., "parted")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Whether a non-zero exit is an error
    pub check: bool,
    /// Whether stdout/stderr are buffered for the caller or streamed live
    pub capture: bool,
    /// Data written to the command's standard input
    pub stdin: Option<String>,
    /// Whether arguments may appear in the log
    pub log_args: bool,
}

impl CommandSpec {
    /// Creates a new CommandSpec that must succeed and captures its output.
    #[must_use]
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            check: true,
            capture: true,
            stdin: None,
            log_args: true,
        }
    }

    /// Tolerates a non-zero exit status.
    #[must_use]
    pub fn allow_failure(mut self) -> Self {
        self.check = false;
        self
    }

    /// Streams output to the log instead of capturing it.
    ///
    /// The returned [`ExecutionResult`] has empty `stdout` and `stderr`.
    #[must_use]
    pub fn stream_output(mut self) -> Self {
        self.capture = false;
        self
    }

    /// Feeds `input` to the command's standard input.
    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Keeps the arguments out of the log. Required for anything carrying a credential.
    #[must_use]
    pub fn hide_args(mut self) -> Self {
        self.log_args = false;
        self
    }

    /// Returns the full command vector as a single string.
    pub fn command_line(&self) -> String {
        format_command(&self.command, &self.args)
    }

    /// Returns the representation of this command that is safe to log.
    pub fn log_line(&self) -> String {
        if self.log_args {
            self.command_line()
        } else {
            format!("{} ... (args hidden)", self.command)
        }
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let args: &dyn std::fmt::Debug = if self.log_args { &self.args } else { &"<hidden>" };
        f.debug_struct("CommandSpec")
            .field("command", &self.command)
            .field("args", args)
            .field("check", &self.check)
            .field("capture", &self.capture)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Result of command execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, -1 if the process was terminated by a signal
    pub exit_code: i32,
    /// Captured stdout (empty when streamed)
    pub stdout: String,
    /// Captured stderr (empty when streamed)
    pub stderr: String,
}

impl ExecutionResult {
    /// Creates a successful result with the given stdout.
    pub fn success_with(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so one executor can be shared
/// with the background installation worker.
pub trait CommandExecutor: Send + Sync {
    /// Executes a command and returns its raw result, regardless of exit status.
    ///
    /// Errors are reserved for failures to run the command at all
    /// (not found, spawn failure, broken pipes).
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;

    /// Writes `content` to `path`, through the privileged writer when `elevated`.
    fn write_file(&self, path: &Utf8Path, content: &str, elevated: bool) -> Result<()>;

    /// Returns true if this executor performs no real system mutation.
    fn is_simulated(&self) -> bool {
        false
    }

    /// Executes a command, turning a non-zero exit into
    /// [`InstallerError::CommandFailed`] when `spec.check` is set.
    fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let result = self.execute(spec)?;
        if spec.check && !result.success() {
            return Err(InstallerError::CommandFailed {
                command: spec.log_line(),
                code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(result)
    }
}

/// Runs a command whose failure must never abort the caller.
///
/// Failures (including non-zero exits) are logged at WARN level and
/// swallowed; the result is returned only if the command succeeded.
pub fn run_best_effort(
    executor: &dyn CommandExecutor,
    spec: CommandSpec,
) -> Option<ExecutionResult> {
    let line = spec.log_line();
    match executor.run(&spec.allow_failure()) {
        Ok(result) if result.success() => Some(result),
        Ok(result) => {
            let stderr = result.stderr.trim();
            warn!(
                "best-effort command `{}` exited with code {}: {}",
                line,
                result.exit_code,
                if stderr.is_empty() { "<no stderr>" } else { stderr }
            );
            None
        }
        Err(e) => {
            warn!("best-effort command `{}` could not run: {:#}", line, e);
            None
        }
    }
}
