//! Server capability and dispatch outcome translation.
//!
//! Every transport turns the result of [`Dispatch::dispatch`] into a response
//! body the same way:
//!
//! - success: the body the action sent (empty if it sent none)
//! - [`XrpcError::ActionNotFound`]: `{"error":"action not found"}`
//! - any other error: `{"error":"<message>"}`
//!
//! [`Dispatch::dispatch`]: crate::service::Dispatch::dispatch
//! [`XrpcError::ActionNotFound`]: crate::error::XrpcError::ActionNotFound

use bytes::Bytes;

use crate::error::Result;
use crate::response::error_envelope;
use crate::service::BoxFuture;

/// Accepts connections and runs requests through a dispatcher.
pub trait Server: Send + Sync {
    /// Bind `address` and serve until the listener fails.
    ///
    /// Accepted forms are `tcp://`, `tcp4://`, `tcp6://`, a bare `host:port`
    /// and `unix://` on Unix. Anything else fails with
    /// [`XrpcError::UnsupportedNetwork`](crate::error::XrpcError::UnsupportedNetwork).
    fn listen<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Response body for a finished dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Bytes to send back.
    pub body: Bytes,
    /// Whether `body` is an error envelope.
    pub is_error: bool,
}

impl Outcome {
    /// Translate a dispatch result plus the body the action sent.
    ///
    /// An error wins over a body sent before the failure.
    pub fn from_dispatch(result: Result<()>, sent: Option<Bytes>) -> Self {
        match result {
            Ok(()) => Self {
                body: sent.unwrap_or_default(),
                is_error: false,
            },
            Err(err) => Self {
                body: error_envelope(&err),
                is_error: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XrpcError;

    #[test]
    fn test_success_passes_body_through() {
        let outcome = Outcome::from_dispatch(Ok(()), Some(Bytes::from_static(b"\"pong\"")));
        assert_eq!(&outcome.body[..], b"\"pong\"");
        assert!(!outcome.is_error);

        let outcome = Outcome::from_dispatch(Ok(()), None);
        assert!(outcome.body.is_empty());
    }

    #[test]
    fn test_not_found_sentinel() {
        let outcome = Outcome::from_dispatch(Err(XrpcError::ActionNotFound), None);
        assert_eq!(&outcome.body[..], br#"{"error":"action not found"}"#);
        assert!(outcome.is_error);
    }

    #[test]
    fn test_error_wins_over_sent_body() {
        let outcome = Outcome::from_dispatch(
            Err(XrpcError::Remote("boom".into())),
            Some(Bytes::from_static(b"1")),
        );
        assert_eq!(&outcome.body[..], br#"{"error":"boom"}"#);
    }
}
