//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame: header, action name and payload.
//! Uses `bytes::Bytes` for zero-copy sharing of both bodies.
//!
//! # Example
//!
//! ```
//! use xrpc::protocol::Frame;
//! use bytes::Bytes;
//!
//! let frame = Frame::request(42, Bytes::from_static(b"hello"), Bytes::from_static(b"{}")).unwrap();
//!
//! assert_eq!(frame.request_id(), 42);
//! assert_eq!(frame.action(), b"hello");
//! assert_eq!(frame.payload(), b"{}");
//! ```

use bytes::Bytes;

use super::wire_format::{flags, Header, HEADER_SIZE};
use crate::error::{Result, XrpcError};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Action name bytes (empty on responses).
    pub action: Bytes,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from already-consistent parts.
    pub fn new(header: Header, action: Bytes, payload: Bytes) -> Self {
        Self {
            header,
            action,
            payload,
        }
    }

    /// Build a request frame, filling in the lengths.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the action or payload is too long for the
    /// header fields.
    pub fn request(request_id: u32, action: Bytes, payload: Bytes) -> Result<Self> {
        Self::build(flags::REQUEST, request_id, action, payload)
    }

    /// Build a response frame. `is_error` marks an error envelope.
    pub fn response(request_id: u32, payload: Bytes, is_error: bool) -> Result<Self> {
        let flags = if is_error {
            flags::ERROR_RESPONSE
        } else {
            flags::RESPONSE
        };
        Self::build(flags, request_id, Bytes::new(), payload)
    }

    fn build(flags: u8, request_id: u32, action: Bytes, payload: Bytes) -> Result<Self> {
        let action_length = u16::try_from(action.len()).map_err(|_| {
            XrpcError::Protocol(format!("Action name length {} exceeds 65535", action.len()))
        })?;
        let payload_length = u32::try_from(payload.len()).map_err(|_| {
            XrpcError::Protocol(format!("Payload size {} exceeds u32", payload.len()))
        })?;

        Ok(Self {
            header: Header::new(flags, request_id, action_length, payload_length),
            action,
            payload,
        })
    }

    /// Get a reference to the action bytes.
    #[inline]
    pub fn action(&self) -> &[u8] {
        &self.action
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Get the flags byte.
    #[inline]
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// Get the request ID.
    #[inline]
    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    /// Check if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    /// Check if this is an error response.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.is_error()
    }

    /// Total encoded size.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.action.len() + self.payload.len()
    }

    /// Encode into a single contiguous buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.action);
        buf.extend_from_slice(&self.payload);
        buf
    }
}
