//! Wire format encoding and decoding.
//!
//! Implements the 11-byte header format:
//! ```text
//! ┌───────┬──────────┬────────────┬─────────────┐
//! │ Flags │ Req ID   │ Action len │ Payload len │
//! │ 1 byte│ 4 bytes  │ 2 bytes    │ 4 bytes     │
//! │       │ uint32 BE│ uint16 BE  │ uint32 BE   │
//! └───────┴──────────┴────────────┴─────────────┘
//! ```
//!
//! The header is followed by `action_len` bytes of action name and
//! `payload_len` bytes of payload. All multi-byte integers are Big Endian.

use crate::error::{Result, XrpcError};

/// Header size in bytes (fixed, exactly 11).
pub const HEADER_SIZE: usize = 11;

/// Default maximum payload size (64 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Flag constants for the protocol.
pub mod flags {
    /// Message type: response (1) or request (0).
    pub const IS_RESPONSE: u8 = 0b0000_0001;
    /// Error flag: the payload is an error envelope.
    pub const IS_ERROR: u8 = 0b0000_0010;

    /// Reserved bits mask (bits 2-7).
    pub const RESERVED_MASK: u8 = 0b1111_1100;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }

    /// Request flags.
    pub const REQUEST: u8 = 0;
    /// Response flags.
    pub const RESPONSE: u8 = IS_RESPONSE;
    /// Error response flags: is_response + is_error = 0x03
    pub const ERROR_RESPONSE: u8 = IS_RESPONSE | IS_ERROR;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Request identifier, echoed back in the response.
    pub request_id: u32,
    /// Action name length in bytes.
    pub action_length: u16,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(flags: u8, request_id: u32, action_length: u16, payload_length: u32) -> Self {
        Self {
            flags,
            request_id,
            action_length,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use xrpc::protocol::{Header, flags};
    ///
    /// let header = Header::new(flags::RESPONSE, 42, 0, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 11);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (11 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.flags;
        buf[1..5].copy_from_slice(&self.request_id.to_be_bytes());
        buf[5..7].copy_from_slice(&self.action_length.to_be_bytes());
        buf[7..11].copy_from_slice(&self.payload_length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use xrpc::protocol::Header;
    ///
    /// let bytes = [0x01, 0, 0, 0, 42, 0, 5, 0, 0, 0, 100];
    /// let header = Header::decode(&bytes).unwrap();
    /// assert_eq!(header.request_id, 42);
    /// assert_eq!(header.action_length, 5);
    /// assert_eq!(header.payload_length, 100);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            flags: buf[0],
            request_id: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
            action_length: u16::from_be_bytes([buf[5], buf[6]]),
            payload_length: u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(XrpcError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(XrpcError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Bytes following the header (action + payload).
    #[inline]
    pub fn body_length(&self) -> usize {
        self.action_length as usize + self.payload_length as usize
    }

    /// Check if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RESPONSE)
    }

    /// Check if this is an error response.
    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_ERROR)
    }
}
