//! Codec module - serialization/deserialization for payloads.
//!
//! - [`JsonCodec`] - JSON using `serde_json`
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so generic `bind`/`respond` helpers stay monomorphic.

mod json;

pub use json::JsonCodec;
