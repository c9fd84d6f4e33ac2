//! JSON envelope carried in request frame payloads.
//!
//! ```text
//! {"headers":{"X-Service-Request-Id":"id_1"},"data":{"name":"Ada"}}
//! ```
//!
//! `headers` is omitted when empty. `data` is kept as raw JSON on the
//! receiving side so actions bind it without an intermediate `Value`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::Result;
use crate::message::{Headers, Message};

#[derive(Serialize)]
struct Outgoing<'a> {
    #[serde(skip_serializing_if = "Headers::is_empty")]
    headers: Headers,
    data: &'a Value,
}

/// Decoded request envelope.
#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    headers: Headers,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

impl RequestEnvelope {
    /// Encode `msg` (wire headers plus data) as a request payload.
    pub fn encode(msg: &Message) -> Result<Bytes> {
        JsonCodec::encode_bytes(&Outgoing {
            headers: msg.wire_headers(),
            data: msg.data(),
        })
    }

    /// Decode a request payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        JsonCodec::decode(payload)
    }

    /// Received headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Split into headers and the raw JSON data (`null` when absent).
    pub fn into_parts(self) -> (Headers, Bytes) {
        let data = match self.data {
            Some(raw) => Bytes::from(String::from(Box::<str>::from(raw))),
            None => Bytes::from_static(b"null"),
        };
        (self.headers, data)
    }
}
