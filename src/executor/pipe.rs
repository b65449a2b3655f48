//! Live forwarding of streamed command output into the log.
//!
//! Long-running commands (package installation, bootloader setup) run with
//! their output streamed rather than captured; each line is forwarded to
//! the log as soon as it is read so progress stays visible.

use std::io::{BufRead, BufReader, Read};

/// Type of output stream for logging purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
pub(crate) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Reads from a pipe until EOF and logs each line, returning the line count.
///
/// - stdout is logged at INFO level, stderr at WARN level
/// - Binary data uses lossy UTF-8 conversion
/// - I/O errors stop reading but don't fail the command; success is
///   decided by the exit status alone
pub(super) fn forward_pipe_to_log<R: Read>(pipe: Option<R>, stream_type: StreamType) -> usize {
    let Some(pipe) = pipe else {
        tracing::error!(stream = %stream_type, "pipe was not attached, output is lost");
        return 0;
    };

    let mut reader = BufReader::new(pipe);
    let mut line_buf = Vec::new();
    let mut lines = 0;

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break,
            Ok(_) => {
                let content = line_buf.strip_suffix(b"\n").unwrap_or(&line_buf);
                log_line(content, stream_type);
                lines += 1;
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }

    lines
}

/// Logs a complete line at the level matching its stream.
///
/// Trailing CR is trimmed; pacstrap progress bars emit CRLF.
fn log_line(line: &[u8], stream_type: StreamType) {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end_matches('\r');
    match stream_type {
        StreamType::Stdout => tracing::info!(stream = %stream_type, "{}", trimmed),
        StreamType::Stderr => tracing::warn!(stream = %stream_type, "{}", trimmed),
    }
}
