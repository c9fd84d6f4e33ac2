//! Outbound call result.
//!
//! Every transport reports failures through the response instead of a
//! `Result`: [`Response::error`] returns the transport error if one
//! occurred, otherwise the error embedded in the payload:
//!
//! | payload                          | `error()`                    |
//! |----------------------------------|------------------------------|
//! | `{"error":"action not found"}`   | `Some(ActionNotFound)`       |
//! | `{"error":"boom"}`               | `Some(Remote("boom"))`       |
//! | `{"error":""}`, `{"ok":1}`, `42` | `None`                       |
//!
//! The derivation runs at most once per response.

use std::any::Any;
use std::fmt;
use std::sync::OnceLock;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::{Result, XrpcError, ACTION_NOT_FOUND};

/// Result of an outbound call.
pub trait Response: Send + Sync {
    /// Underlying transport object, if the transport produced one.
    fn source(&self) -> Option<&(dyn Any + Send + Sync)>;

    /// Raw payload.
    ///
    /// # Errors
    ///
    /// The transport error if the call failed, or
    /// [`XrpcError::InvalidResponse`] if no payload was produced.
    fn body(&self) -> Result<&[u8]>;

    /// Transport error, or the error embedded in the payload.
    fn error(&self) -> Option<&XrpcError>;
}

/// Typed helpers available on every [`Response`].
pub trait ResponseExt: Response {
    /// Decode the payload into `T`.
    fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        JsonCodec::decode(self.body()?)
    }

    /// `Err` with [`Response::error`] if there is one, `Ok(())` otherwise.
    fn check(&self) -> Result<()> {
        match self.error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl<R: Response + ?Sized> ResponseExt for R {}

/// Map an error payload to an error kind.
///
/// Returns `None` unless `body` is a JSON object whose `"error"` member is a
/// non-empty string.
pub fn derive_error(body: &[u8]) -> Option<XrpcError> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("error")?.as_str()? {
        "" => None,
        ACTION_NOT_FOUND => Some(XrpcError::ActionNotFound),
        message => Some(XrpcError::Remote(message.to_string())),
    }
}

/// Build the `{"error": "..."}` payload a server sends for a failed dispatch.
pub fn error_envelope(err: &XrpcError) -> Bytes {
    let body = serde_json::json!({ "error": err.to_string() });
    Bytes::from(body.to_string())
}

/// Concrete [`Response`] shared by the bundled transports.
pub struct Reply {
    body: Option<Bytes>,
    source: Option<Box<dyn Any + Send + Sync>>,
    transport_error: Option<XrpcError>,
    derived: OnceLock<Option<XrpcError>>,
}

impl Reply {
    /// A reply carrying a received payload.
    pub fn new(body: Bytes) -> Self {
        Self {
            body: Some(body),
            source: None,
            transport_error: None,
            derived: OnceLock::new(),
        }
    }

    /// A reply for a call that failed at the transport level.
    pub fn failed(err: XrpcError) -> Self {
        Self {
            body: None,
            source: None,
            transport_error: Some(err),
            derived: OnceLock::new(),
        }
    }

    /// Attach the raw transport object.
    pub fn with_source<S: Any + Send + Sync>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Take the payload out, if any.
    pub fn into_body(self) -> Option<Bytes> {
        self.body
    }
}

impl Response for Reply {
    fn source(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.source.as_deref()
    }

    fn body(&self) -> Result<&[u8]> {
        if let Some(err) = &self.transport_error {
            return Err(err.clone());
        }
        self.body.as_deref().ok_or(XrpcError::InvalidResponse)
    }

    fn error(&self) -> Option<&XrpcError> {
        if let Some(err) = &self.transport_error {
            return Some(err);
        }
        self.derived
            .get_or_init(|| self.body.as_deref().and_then(derive_error))
            .as_ref()
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("body", &self.body)
            .field("transport_error", &self.transport_error)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_action_not_found_is_normalized() {
        let reply = Reply::new(Bytes::from_static(br#"{"error":"action not found"}"#));
        assert!(matches!(reply.error(), Some(XrpcError::ActionNotFound)));
        assert!(reply.check().unwrap_err().is_action_not_found());
    }

    #[test]
    fn test_remote_error_message() {
        let reply = Reply::new(Bytes::from_static(br#"{"error":"boom"}"#));
        match reply.error() {
            Some(XrpcError::Remote(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_error_field() {
        let reply = Reply::new(Bytes::from_static(br#"{"msg":"Hello Ada!"}"#));
        assert!(reply.error().is_none());
        assert!(reply.check().is_ok());
    }

    #[test]
    fn test_empty_or_non_object_payloads_have_no_error() {
        for body in [
            &br#"{"error":""}"#[..],
            br#"["boom"]"#,
            br#""error""#,
            br#"{"error":5}"#,
            b"not json",
            b"",
        ] {
            let reply = Reply::new(Bytes::copy_from_slice(body));
            assert!(reply.error().is_none(), "payload {:?}", body);
        }
    }

    #[test]
    fn test_transport_error_wins() {
        let reply = Reply::failed(XrpcError::ConnectionClosed);
        assert!(matches!(reply.error(), Some(XrpcError::ConnectionClosed)));
        assert!(matches!(
            reply.bind::<serde_json::Value>(),
            Err(XrpcError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_bind_without_body_is_invalid() {
        let reply = Reply {
            body: None,
            source: None,
            transport_error: None,
            derived: OnceLock::new(),
        };
        assert!(matches!(reply.body(), Err(XrpcError::InvalidResponse)));
        assert!(reply.error().is_none());
    }

    #[test]
    fn test_bind_payload() {
        #[derive(Deserialize)]
        struct Greeting {
            msg: String,
        }

        let reply = Reply::new(Bytes::from_static(br#"{"msg":"Hello Ada!"}"#));
        let greeting: Greeting = reply.bind().unwrap();
        assert_eq!(greeting.msg, "Hello Ada!");
    }

    #[test]
    fn test_error_is_memoized() {
        let reply = Reply::new(Bytes::from_static(br#"{"error":"boom"}"#));
        let first = reply.error().unwrap() as *const XrpcError;
        let second = reply.error().unwrap() as *const XrpcError;
        assert_eq!(first, second);
    }

    #[test]
    fn test_source_downcast() {
        let reply = Reply::new(Bytes::new()).with_source(7u32);
        let source = reply.source().unwrap();
        assert_eq!(source.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn test_error_envelope_round_trip() {
        let body = error_envelope(&XrpcError::ActionNotFound);
        assert_eq!(&body[..], br#"{"error":"action not found"}"#);
        assert!(matches!(derive_error(&body), Some(XrpcError::ActionNotFound)));

        let body = error_envelope(&XrpcError::Remote(r#"say "hi""#.into()));
        match derive_error(&body) {
            Some(XrpcError::Remote(msg)) => assert_eq!(msg, r#"say "hi""#),
            other => panic!("unexpected {:?}", other),
        }
    }
}
