//! Network reachability probe.

use tracing::debug;

use crate::executor::{CommandExecutor, CommandSpec};

/// Address pinged to decide whether package mirrors are likely reachable.
pub const PROBE_ADDRESS: &str = "8.8.8.8";

/// Returns true if a single ping to [`PROBE_ADDRESS`] is answered within two seconds.
///
/// Never fails: a probe that cannot run counts as offline.
pub fn is_online(executor: &dyn CommandExecutor) -> bool {
    let spec = CommandSpec::new("ping", ["-c", "1", "-W", "2", PROBE_ADDRESS]).allow_failure();
    match executor.run(&spec) {
        Ok(result) => result.success(),
        Err(e) => {
            debug!("network probe failed: {:#}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionResult, SimulatedExecutor};
    use anyhow::Result;
    use camino::Utf8Path;
    use std::time::Duration;

    struct Unreachable;

    impl CommandExecutor for Unreachable {
        fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
            assert_eq!(spec.command, "ping");
            Ok(ExecutionResult {
                exit_code: 1,
                ..Default::default()
            })
        }

        fn write_file(&self, _path: &Utf8Path, _content: &str, _elevated: bool) -> Result<()> {
            Ok(())
        }
    }

    struct Missing;

    impl CommandExecutor for Missing {
        fn execute(&self, _spec: &CommandSpec) -> Result<ExecutionResult> {
            anyhow::bail!("command not found in PATH: ping")
        }

        fn write_file(&self, _path: &Utf8Path, _content: &str, _elevated: bool) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_simulated_is_online() {
        assert!(is_online(&SimulatedExecutor::new().with_delay(Duration::ZERO)));
    }

    #[test]
    fn test_unanswered_ping_is_offline() {
        assert!(!is_online(&Unreachable));
    }

    #[test]
    fn test_missing_ping_is_offline() {
        assert!(!is_online(&Missing));
    }
}
