//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which executes commands
//! on the live system using `std::process::Command`, either capturing
//! their output or streaming it line by line into the log.

use std::fs;
use std::io::Write;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::thread::JoinHandle;

use anyhow::Result;
use camino::Utf8Path;
use tracing::info;
use which::which;

use super::pipe::{StreamType, forward_pipe_to_log, panic_message};
use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::error::InstallerError;
use crate::privilege::PrivilegeMethod;

/// Cleans up a child process and its associated reader threads.
///
/// Kills the child process, waits for it to terminate, and joins all
/// reader threads. Called from error paths so no process or thread leaks.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<usize>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

/// Converts an exit status into an exit code, using -1 for signal termination.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Writes the command's stdin payload (if any) and closes the pipe.
fn feed_stdin(child: &mut Child, spec: &CommandSpec) -> std::io::Result<()> {
    if let Some(input) = &spec.stdin
        && let Some(mut stdin) = child.stdin.take()
    {
        stdin.write_all(input.as_bytes())?;
    }
    Ok(())
}

/// Writes the stdin payload from a helper thread, so a child that fills its
/// output pipes before reading all input cannot block the write.
fn spawn_stdin_writer(
    child: &mut Child,
    spec: &CommandSpec,
) -> std::io::Result<Option<JoinHandle<std::io::Result<()>>>> {
    let (Some(input), Some(mut stdin)) = (spec.stdin.clone(), child.stdin.take()) else {
        return Ok(None);
    };
    thread::Builder::new()
        .name("stdin-writer".to_string())
        .spawn(move || stdin.write_all(input.as_bytes()))
        .map(Some)
}

fn execution_error(spec: &CommandSpec, status: String) -> anyhow::Error {
    InstallerError::CommandFailed {
        command: spec.log_line(),
        code: -1,
        stderr: status,
    }
    .into()
}

/// Command executor that runs actual system commands.
///
/// Elevated file writes are piped into `<privilege> tee <path>`.
#[derive(Debug, Default, Clone)]
pub struct RealCommandExecutor {
    pub privilege: PrivilegeMethod,
    writer: Option<(String, Vec<String>)>,
}

impl RealCommandExecutor {
    pub fn new(privilege: PrivilegeMethod) -> Self {
        Self {
            privilege,
            writer: None,
        }
    }

    /// Replaces the privileged writer with `<program> <args...> <path>`.
    ///
    /// The content is still delivered on stdin.
    pub fn with_writer<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writer = Some((program.into(), args.into_iter().map(Into::into).collect()));
        self
    }

    fn writer_command(&self, path: &Utf8Path) -> (String, Vec<String>) {
        match &self.writer {
            Some((program, args)) => {
                let mut args = args.clone();
                args.push(path.to_string());
                (program.clone(), args)
            }
            None => (
                self.privilege.command_name().to_string(),
                self.privilege.writer_args(path.as_str()),
            ),
        }
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Child> {
        let program = which(&spec.command).map_err(|_| InstallerError::CommandNotFound {
            command: spec.command.clone(),
        })?;
        tracing::trace!("command found: {}: {}", spec.command, program.to_string_lossy());

        let mut command = Command::new(program);
        command.args(&spec.args);
        command.stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let child = command
            .spawn()
            .map_err(|e| InstallerError::io(format!("failed to spawn `{}`", spec.log_line()), e))?;
        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());
        Ok(child)
    }

    fn run_captured(&self, mut child: Child, spec: &CommandSpec) -> Result<ExecutionResult> {
        let stdin_handle = match spawn_stdin_writer(&mut child, spec) {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(execution_error(
                    spec,
                    format!("failed to spawn stdin writer thread: {}", e),
                ));
            }
        };

        let output = child
            .wait_with_output()
            .map_err(|e| execution_error(spec, format!("failed to wait for command: {}", e)))?;

        if let Some(handle) = stdin_handle {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(execution_error(spec, format!("failed to write stdin: {}", e)));
                }
                Err(e) => {
                    return Err(execution_error(
                        spec,
                        format!("stdin writer thread panicked: {}", panic_message(&*e)),
                    ));
                }
            }
        }

        Ok(ExecutionResult {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_streamed(&self, mut child: Child, spec: &CommandSpec) -> Result<ExecutionResult> {
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_handle = match thread::Builder::new()
            .name("stdout-reader".to_string())
            .spawn(move || forward_pipe_to_log(stdout_pipe, StreamType::Stdout))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(execution_error(
                    spec,
                    format!("failed to spawn stdout reader thread: {}", e),
                ));
            }
        };

        let stderr_handle = match thread::Builder::new()
            .name("stderr-reader".to_string())
            .spawn(move || forward_pipe_to_log(stderr_pipe, StreamType::Stderr))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(execution_error(
                    spec,
                    format!("failed to spawn stderr reader thread: {}", e),
                ));
            }
        };

        if let Err(e) = feed_stdin(&mut child, spec) {
            cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
            return Err(execution_error(spec, format!("failed to write stdin: {}", e)));
        }

        let status = match child.wait() {
            Ok(s) => s,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(execution_error(spec, format!("failed to wait for command: {}", e)));
            }
        };

        let mut panicked_streams = Vec::new();
        for (name, handle) in [("stdout", stdout_handle), ("stderr", stderr_handle)] {
            match handle.join() {
                Ok(lines) => tracing::trace!(stream = name, lines, "reader finished"),
                Err(e) => {
                    let msg = panic_message(&*e);
                    tracing::error!(stream = name, panic = msg, "reader thread panicked");
                    panicked_streams.push(format!("{}: {}", name, msg));
                }
            }
        }

        if !panicked_streams.is_empty() {
            return Err(execution_error(
                spec,
                format!("reader thread(s) panicked: {}", panicked_streams.join(", ")),
            ));
        }

        Ok(ExecutionResult {
            exit_code: exit_code(status),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn write_elevated(&self, path: &Utf8Path, content: &str) -> Result<(), InstallerError> {
        let (program, args) = self.writer_command(path);
        let writer = match args.first() {
            Some(first) => format!("{} {}", program, first),
            None => program.clone(),
        };
        let write_failed = |reason: String| InstallerError::WriteFailed {
            path: path.to_string(),
            reason,
        };

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| write_failed(format!("failed to spawn {}: {}", writer, e)))?;

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(content.as_bytes())
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(write_failed(format!("failed to pipe content to {}: {}", writer, e)));
        }

        let output = child
            .wait_with_output()
            .map_err(|e| write_failed(format!("failed to wait for {}: {}", writer, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(write_failed(format!(
                "{} exited with {}: {}",
                writer,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        info!("Executing: {}", spec.log_line());

        let child = self.spawn(spec)?;
        let result = if spec.capture {
            self.run_captured(child, spec)?
        } else {
            self.run_streamed(child, spec)?
        };

        tracing::trace!("executed command: {}: exit_code={}", spec.command, result.exit_code);
        Ok(result)
    }

    fn write_file(&self, path: &Utf8Path, content: &str, elevated: bool) -> Result<()> {
        info!("Writing file: {}", path);
        if elevated {
            self.write_elevated(path, content)?;
        } else {
            fs::write(path, content)
                .map_err(|e| InstallerError::io(format!("failed to write file: {}", path), e))?;
        }
        Ok(())
    }
}
