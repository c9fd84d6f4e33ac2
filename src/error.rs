//! Error types for xrpc.
//!
//! Every error is `Clone` so that a response can memoize its derived error
//! and still hand it out by value from `bind()`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Payload string a remote side sends when it has no action for a name.
///
/// Equal to the `Display` output of [`XrpcError::ActionNotFound`], so a miss
/// looks the same whether it happened locally or on the other side of a call.
pub const ACTION_NOT_FOUND: &str = "action not found";

/// Main error type for all xrpc operations.
#[derive(Debug, Clone, Error)]
pub enum XrpcError {
    /// Action registration with a zero-length name.
    #[error("action name is empty")]
    EmptyActionName,

    /// No action bound to the requested name (local lookup miss or remote signal).
    #[error("action not found")]
    ActionNotFound,

    /// Bind attempted on a response that carries no transport result.
    #[error("invalid response")]
    InvalidResponse,

    /// Any other non-empty error string reported by the remote side.
    #[error("{0}")]
    Remote(String),

    /// I/O error on a socket.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// Protocol error (malformed frame, reserved flags, oversized payload).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response arrived within the resolved timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write buffer full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// Address scheme the transport cannot dial or listen on.
    #[error("connection type [{0}] not supported")]
    UnsupportedNetwork(String),

    /// Invalid construction parameters.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl XrpcError {
    /// True for [`XrpcError::ActionNotFound`].
    #[inline]
    pub fn is_action_not_found(&self) -> bool {
        matches!(self, XrpcError::ActionNotFound)
    }
}

impl From<std::io::Error> for XrpcError {
    fn from(err: std::io::Error) -> Self {
        XrpcError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for XrpcError {
    fn from(err: serde_json::Error) -> Self {
        XrpcError::Json(Arc::new(err))
    }
}

/// Result type alias using XrpcError.
pub type Result<T> = std::result::Result<T, XrpcError>;
