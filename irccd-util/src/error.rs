//! Error types shared by the irccd daemon and its control client.

use std::path::PathBuf;

/// Unified error type for irccd operations.
#[derive(Debug, thiserror::Error)]
pub enum IrccdError {
    // === IO ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection ===
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("daemon not running at {path}")]
    NotRunning { path: PathBuf },

    #[error("connection timed out after {seconds}s")]
    ConnectionTimeout { seconds: u64 },

    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    // === Protocol (spec §7 "Protocol error") ===
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server version too recent (daemon {daemon_major}.{daemon_minor}, client supports up to {daemon_major}.x)")]
    VersionTooRecent { daemon_major: u32, daemon_minor: u32 },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    // === Policy (spec §7 "Policy error") ===
    #[error("server '{0}' already exists")]
    ServerExists(String),

    #[error("server '{0}' does not exist")]
    ServerNotFound(String),

    #[error("invalid '{name}' property ({expected} expected, got {got})")]
    InvalidPropertyType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("missing '{0}' property")]
    MissingProperty(String),

    #[error("property '{name}' is out of range {min}..{max}, got {got}")]
    OutOfRange {
        name: String,
        min: i64,
        max: i64,
        got: i64,
    },

    #[error("command does not exist")]
    UnknownCommand,

    #[error("rule index {index} out of range (len {len})")]
    RuleIndexOutOfRange { index: usize, len: usize },

    // === Config ===
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Transport / TLS ===
    #[error("transport error: {0}")]
    Transport(String),

    #[error("TLS error: {0}")]
    Tls(String),

    // === Internal / fatal ===
    #[error("internal error: {0}")]
    Internal(String),

    #[error("fatal startup error: {0}")]
    Fatal(String),
}

impl IrccdError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this failure is transient and worth retrying (spec §7
    /// "Transient socket" is handled before ever reaching this type; this
    /// covers the retryable subset of connection failures instead).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Connection(_))
    }
}

/// Result type alias using [`IrccdError`].
pub type Result<T> = std::result::Result<T, IrccdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = IrccdError::ServerExists("freenode".into());
        assert_eq!(err.to_string(), "server 'freenode' already exists");
    }

    #[test]
    fn retryable_classification() {
        assert!(IrccdError::ConnectionTimeout { seconds: 5 }.is_retryable());
        assert!(!IrccdError::ServerNotFound("x".into()).is_retryable());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: IrccdError = io_err.into();
        assert!(matches!(err, IrccdError::Io(_)));
    }
}
