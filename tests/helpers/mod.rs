use std::sync::{Condvar, Mutex};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use endos_installer::config::{InstallConfig, InstallerOptions};
use endos_installer::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use std::time::Duration;

/// One command seen by [`RecordingExecutor`].
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedCall {
    pub command_line: String,
    pub log_line: String,
    pub stdin: Option<String>,
    pub capture: bool,
    pub check: bool,
    pub log_args: bool,
}

/// One file write seen by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct RecordedWrite {
    pub path: Utf8PathBuf,
    pub content: String,
    pub elevated: bool,
}

/// Fstab text returned for `genfstab`.
#[allow(dead_code)]
pub const FSTAB: &str = "UUID=0a1b / ext4 rw,relatime 0 1\n";

/// Executor that records every call and answers probes from its settings.
///
/// Any command whose full command line contains one of `failing` exits 1.
pub struct RecordingExecutor {
    pub uefi: bool,
    pub runtime_env_present: bool,
    pub failing: Vec<String>,
    calls: Mutex<Vec<RecordedCall>>,
    writes: Mutex<Vec<RecordedWrite>>,
    gate: Option<(Mutex<bool>, Condvar)>,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn uefi() -> Self {
        Self {
            uefi: true,
            runtime_env_present: false,
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn bios() -> Self {
        Self {
            uefi: false,
            ..Self::uefi()
        }
    }

    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.failing.push(pattern.into());
        self
    }

    pub fn with_runtime_env(mut self) -> Self {
        self.runtime_env_present = true;
        self
    }

    /// Blocks every command until [`open`](Self::open) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some((Mutex::new(false), Condvar::new()));
        self
    }

    pub fn open(&self) {
        if let Some((open, cvar)) = &self.gate {
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command_line).collect()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn find(&self, prefix: &str) -> Option<RecordedCall> {
        self.calls().into_iter().find(|c| c.command_line.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.command_lines().iter().position(|c| c.starts_with(prefix))
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let command_line = spec.command_line();
        self.calls.lock().unwrap().push(RecordedCall {
            command_line: command_line.clone(),
            log_line: spec.log_line(),
            stdin: spec.stdin.clone(),
            capture: spec.capture,
            check: spec.check,
            log_args: spec.log_args,
        });

        if let Some((open, cvar)) = &self.gate {
            let mut guard = open.lock().unwrap();
            while !*guard {
                guard = cvar.wait(guard).unwrap();
            }
        }

        if self.failing.iter().any(|p| command_line.contains(p.as_str())) {
            return Ok(ExecutionResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: "simulated failure\n".to_string(),
            });
        }

        let exit_code = |present: bool| ExecutionResult {
            exit_code: if present { 0 } else { 1 },
            ..Default::default()
        };
        Ok(match spec.command.as_str() {
            "test" if command_line == "test -d /sys/firmware/efi" => exit_code(self.uefi),
            "test" => exit_code(self.runtime_env_present),
            "genfstab" => ExecutionResult::success_with(FSTAB),
            _ => ExecutionResult::default(),
        })
    }

    fn write_file(&self, path: &Utf8Path, content: &str, elevated: bool) -> Result<()> {
        self.writes.lock().unwrap().push(RecordedWrite {
            path: path.to_path_buf(),
            content: content.to_string(),
            elevated,
        });
        Ok(())
    }
}

/// Options with no settle pauses and a missing package list file.
#[allow(dead_code)]
pub fn test_options() -> InstallerOptions {
    InstallerOptions::default()
        .with_settle_delay(Duration::ZERO)
        .with_package_list("/nonexistent/endos-packages.txt")
}

/// The config of the reference scenario.
#[allow(dead_code)]
pub fn alice_config(disk: &str) -> InstallConfig {
    InstallConfig::new(disk, "alice", "x")
}
