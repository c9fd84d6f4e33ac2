//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary protocol of the frame transport:
//! - 11-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors
//! - JSON request envelope carried in request payloads

mod envelope;
mod frame;
mod frame_buffer;
mod wire_format;

pub use envelope::RequestEnvelope;
pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{flags, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
