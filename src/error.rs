//! Domain-specific error types for the installer.
//!
//! This module defines `InstallerError`, a `thiserror`-based enum that
//! provides typed error variants for the failure modes of an installation
//! run. Library functions that fail in a single well-known way return
//! `Result<T, InstallerError>`, while trait boundaries and the pipeline use
//! `anyhow::Result`.
//!
//! `InstallerError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically, and callers can recover the typed variant
//! with `downcast_ref::<InstallerError>()`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to the OS-level error message.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for the installer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InstallerError {
    /// A command that was required to succeed exited with a non-zero status.
    #[error("command failed: {command} (exit code {code}): {stderr}")]
    CommandFailed {
        /// The full command vector, space separated.
        command: String,
        /// Exit code, or -1 if the process was terminated by a signal.
        code: i32,
        /// Captured stderr, empty when output was streamed instead of captured.
        stderr: String,
    },

    /// The command could not be located on `PATH`.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        /// The program name that was looked up.
        command: String,
    },

    /// A file write did not complete cleanly.
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// Destination path of the write.
        path: String,
        /// Exit status of the privileged writer or the I/O failure.
        reason: String,
    },

    /// Required installation input is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Structured probe output could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred.
        context: String,
        /// Human-readable description derived from [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl InstallerError {
    /// Creates an `Io` variant with the `message` field derived from `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}
