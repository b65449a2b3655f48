//! Simulated command executor.
//!
//! [`SimulatedExecutor`] performs no real system mutation. Read-only
//! probes that feed disk selection and connectivity checks get canned
//! answers, so the whole pipeline can be exercised on a machine without
//! a spare disk; every other command succeeds after a short fixed delay.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use camino::Utf8Path;
use tracing::info;

use super::{CommandExecutor, CommandSpec, ExecutionResult};

/// Block device listing returned for `lsblk -J` in simulated mode.
pub const SIMULATED_LSBLK_JSON: &str = r#"{"blockdevices": [{"name": "sda", "size": "500G", "type": "disk", "children": [{"name": "sda1", "size": "500M", "type": "part"}, {"name": "sda2", "size": "499.5G", "type": "part"}]}]}"#;

/// Default per-command delay, long enough for progress output to be readable.
const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Number of characters of written content shown in the dry-run log.
const PREVIEW_CHARS: usize = 100;

/// Command executor that only logs what it would do.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    delay: Duration,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
        }
    }
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the delay applied to non-probe commands.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn canned_response(&self, spec: &CommandSpec) -> Option<ExecutionResult> {
        match spec.command.as_str() {
            "lsblk" if spec.args.iter().any(|a| a == "-J") => {
                Some(ExecutionResult::success_with(SIMULATED_LSBLK_JSON))
            }
            "lsblk" | "ping" => Some(ExecutionResult::default()),
            _ => None,
        }
    }
}

impl CommandExecutor for SimulatedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if spec.stdin.is_some() && spec.log_args {
            info!("dry run: {} ... (input provided)", spec.command);
        } else {
            info!("dry run: {}", spec.log_line());
        }

        if let Some(result) = self.canned_response(spec) {
            return Ok(result);
        }

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(ExecutionResult::default())
    }

    fn write_file(&self, path: &Utf8Path, content: &str, elevated: bool) -> Result<()> {
        let preview: String = content.chars().take(PREVIEW_CHARS).collect();
        info!("dry run: would write {} (elevated: {}):\n{}", path, elevated, preview);
        Ok(())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
