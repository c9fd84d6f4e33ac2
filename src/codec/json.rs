//! JSON codec using `serde_json`.
//!
//! Payloads, the frame request envelope and error envelopes are all JSON.
//! The remote error convention (`{"error": "..."}`) depends on it, so there
//! is no pluggable binary codec.
//!
//! # Example
//!
//! ```
//! use xrpc::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Quote {
//!     symbol: String,
//!     price: f64,
//! }
//!
//! let quote = Quote { symbol: "ACME".to_string(), price: 12.5 };
//! let encoded = JsonCodec::encode(&quote).unwrap();
//! let decoded: Quote = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, quote);
//! ```

use bytes::Bytes;

use crate::error::Result;

/// JSON codec for structured payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Encode a value straight into `Bytes`.
    #[inline]
    pub fn encode_bytes<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        Self::encode(value).map(Bytes::from)
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Convert a value into a `serde_json::Value` tree.
    #[inline]
    pub fn to_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(value)?)
    }
}
