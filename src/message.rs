//! Outbound call descriptor.
//!
//! A [`Message`] names the action to call, carries its payload and the
//! caller's id/timeout. It is built once and then handed to a client:
//!
//! ```
//! use std::time::Duration;
//! use xrpc::Message;
//!
//! let msg = Message::new("hello", &serde_json::json!({ "name": "Ada" }))
//!     .unwrap()
//!     .with_id("id_1")
//!     .with_timeout(Duration::from_millis(100));
//!
//! assert_eq!(msg.action(), "hello");
//! assert_eq!(msg.id(), Some("id_1"));
//! ```
//!
//! Transports must carry [`HEADER_REQUEST_ID`] and [`HEADER_TIMEOUT`]
//! verbatim; [`Message::wire_headers`] and [`request_meta`] are the two
//! halves of that round trip.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::Result;

/// Header carrying the caller-chosen correlation id.
pub const HEADER_REQUEST_ID: &str = "X-Service-Request-Id";

/// Header carrying the caller's timeout, in nanoseconds as a decimal string.
pub const HEADER_TIMEOUT: &str = "X-Service-Timeout";

/// Header map: names to opaque JSON values.
pub type Headers = BTreeMap<String, Value>;

/// Outbound call descriptor. Immutable once handed to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: Option<String>,
    action: String,
    timeout: Duration,
    headers: Headers,
    data: Value,
}

impl Message {
    /// Create a message for `action` with `data` as payload.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if `data` cannot be serialized.
    pub fn new<T: Serialize + ?Sized>(action: impl Into<String>, data: &T) -> Result<Self> {
        Ok(Self::from_value(action, JsonCodec::to_value(data)?))
    }

    /// Create a message from an already-built JSON value.
    pub fn from_value(action: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            action: action.into(),
            timeout: Duration::ZERO,
            headers: Headers::new(),
            data,
        }
    }

    /// Set the correlation id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the timeout. Zero means "use the backend default".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Correlation id, if set.
    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Action name.
    #[inline]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Timeout (zero = backend default).
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Caller-supplied headers.
    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Payload.
    #[inline]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Headers as they go on the wire: caller headers plus the well-known
    /// id/timeout entries (empty id and zero timeout are omitted).
    pub fn wire_headers(&self) -> Headers {
        let mut headers = self.headers.clone();
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            headers.insert(HEADER_REQUEST_ID.to_string(), Value::from(id));
        }
        if !self.timeout.is_zero() {
            headers.insert(
                HEADER_TIMEOUT.to_string(),
                Value::from(self.timeout.as_nanos().to_string()),
            );
        }
        headers
    }
}

/// Recover the correlation id and timeout from received headers.
///
/// Missing or malformed entries yield an empty id / zero timeout.
pub fn request_meta(headers: &Headers) -> (Vec<u8>, Duration) {
    let id = match headers.get(HEADER_REQUEST_ID) {
        Some(Value::String(id)) => id.as_bytes().to_vec(),
        _ => Vec::new(),
    };

    let nanos = match headers.get(HEADER_TIMEOUT) {
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };

    (id, Duration::from_nanos(nanos.unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let msg = Message::new("geo", &json!({"ip": "127.0.0.1"})).unwrap();
        assert_eq!(msg.id(), None);
        assert_eq!(msg.timeout(), Duration::ZERO);
        assert!(msg.headers().is_empty());
        assert_eq!(msg.data()["ip"], "127.0.0.1");
    }

    #[test]
    fn test_wire_headers_carry_id_and_timeout() {
        let msg = Message::from_value("whois", Value::Null)
            .with_id("id_42")
            .with_timeout(Duration::from_millis(250))
            .with_header("tenant", "acme");

        let headers = msg.wire_headers();
        assert_eq!(headers[HEADER_REQUEST_ID], "id_42");
        assert_eq!(headers[HEADER_TIMEOUT], "250000000");
        assert_eq!(headers["tenant"], "acme");

        let (id, timeout) = request_meta(&headers);
        assert_eq!(id, b"id_42");
        assert_eq!(timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_wire_headers_omit_unset_meta() {
        let msg = Message::from_value("whois", Value::Null).with_id("");
        let headers = msg.wire_headers();
        assert!(!headers.contains_key(HEADER_REQUEST_ID));
        assert!(!headers.contains_key(HEADER_TIMEOUT));
    }

    #[test]
    fn test_request_meta_tolerates_garbage() {
        let mut headers = Headers::new();
        headers.insert(HEADER_REQUEST_ID.to_string(), json!(12));
        headers.insert(HEADER_TIMEOUT.to_string(), json!("soon"));

        let (id, timeout) = request_meta(&headers);
        assert!(id.is_empty());
        assert_eq!(timeout, Duration::ZERO);
    }

    #[test]
    fn test_request_meta_accepts_numeric_timeout() {
        let mut headers = Headers::new();
        headers.insert(HEADER_TIMEOUT.to_string(), json!(1_000));
        assert_eq!(request_meta(&headers).1, Duration::from_nanos(1_000));
    }
}
