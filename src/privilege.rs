//! Privilege escalation for file writes.
//!
//! Elevated writes pipe their content into `<method> tee <path>`, so the
//! installer itself can run unprivileged inside a live session.

use clap::ValueEnum;

/// Privilege escalation method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PrivilegeMethod {
    /// Use `sudo` for privilege escalation.
    #[default]
    Sudo,
    /// Use `doas` for privilege escalation.
    Doas,
}

impl PrivilegeMethod {
    /// Returns the command name for this privilege method.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Sudo => "sudo",
            Self::Doas => "doas",
        }
    }

    /// Returns the argument vector of the privileged writer for `path`.
    pub fn writer_args(&self, path: &str) -> Vec<String> {
        vec!["tee".to_string(), path.to_string()]
    }
}

impl std::fmt::Display for PrivilegeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command_name())
    }
}
