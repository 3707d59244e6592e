//! Session error types.
//!
//! Replaces raw `io::Error` at the callback boundary with a small, classified
//! enum so façade-level logging can decide `warn!` vs `debug!` without
//! re-deriving the `io::ErrorKind` each time.

use std::io;
use thiserror::Error;

/// Error surfaced to `on_close`, `on_connect_failure`, and internal shutdown paths.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Underlying OS/socket error not covered by a more specific variant.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A pending operation was cancelled — connect-timeout expiry, user-initiated
    /// shutdown, or explicit timer cancellation.
    #[error("operation aborted")]
    OperationAborted,

    /// The idle-read timer expired without a rearm.
    #[error("timed out")]
    TimedOut,

    /// Peer closed its write half; read completed with zero bytes.
    #[error("end of file")]
    Eof,

    /// Peer reset the connection (`ECONNRESET`).
    #[error("connection reset")]
    ConnectionReset,

    /// Framed-mode body-length probe returned a negative length.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result alias used throughout the crate's internal plumbing.
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Build a protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// The default shutdown cause for a user-initiated `shutdown()` call.
    #[must_use]
    pub const fn operation_aborted() -> Self {
        Self::OperationAborted
    }

    /// The default shutdown cause for an unexpected half-close (no explicit error).
    #[must_use]
    pub const fn eof() -> Self {
        Self::Eof
    }

    /// Classify an `io::Error` into the closest `SessionError` variant.
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Self::TimedOut,
            io::ErrorKind::ConnectionReset => Self::ConnectionReset,
            io::ErrorKind::ConnectionAborted | io::ErrorKind::Interrupted => {
                Self::OperationAborted
            }
            io::ErrorKind::UnexpectedEof => Self::Eof,
            _ => Self::Io(err),
        }
    }

    /// Whether this error is routine enough to log at `debug!` rather than `warn!`.
    ///
    /// Idle timeouts, user-initiated aborts, and plain EOF are everyday session
    /// endings; anything else (resets, raw IO errors, protocol violations) is
    /// worth a louder log line above the session layer.
    #[must_use]
    pub const fn is_routine(&self) -> bool {
        matches!(self, Self::OperationAborted | Self::TimedOut | Self::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_timed_out() {
        let err = SessionError::from_io(io::Error::new(io::ErrorKind::TimedOut, "x"));
        assert!(matches!(err, SessionError::TimedOut));
        assert!(err.is_routine());
    }

    #[test]
    fn classifies_connection_reset() {
        let err = SessionError::from_io(io::Error::new(io::ErrorKind::ConnectionReset, "x"));
        assert!(matches!(err, SessionError::ConnectionReset));
        assert!(!err.is_routine());
    }

    #[test]
    fn protocol_error_carries_message() {
        let err = SessionError::protocol("negative body length: -1");
        assert_eq!(err.to_string(), "protocol error: negative body length: -1");
    }
}
