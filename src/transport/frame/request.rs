//! Inbound request decoded from a frame.

use std::any::Any;
use std::time::Duration;

use bytes::Bytes;

use crate::context::Context;
use crate::error::Result;
use crate::message::{request_meta, Headers};
use crate::protocol::{Frame, RequestEnvelope};
use crate::request::Request;

/// Transport details exposed through [`Request::source`].
#[derive(Debug, Clone, Default)]
pub struct FrameSource {
    /// Wire request id the response must carry.
    pub request_id: u32,
    /// Peer address (or socket path).
    pub peer: String,
}

/// [`Request`] implementation of the frame transport.
///
/// Instances are recycled through a [`RequestArena`](super::RequestArena).
#[derive(Debug, Default)]
pub struct FrameRequest {
    source: FrameSource,
    action: Bytes,
    id: Vec<u8>,
    timeout: Duration,
    headers: Headers,
    payload: Bytes,
    context: Context,
    response: Option<Bytes>,
}

impl FrameRequest {
    /// Fill from a request frame.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the payload is not a request envelope. The
    /// request id and action are filled in even then, so the caller can
    /// still answer.
    pub fn fill(&mut self, frame: Frame, peer: &str) -> Result<()> {
        self.source.request_id = frame.request_id();
        self.source.peer.clear();
        self.source.peer.push_str(peer);
        self.action = frame.action;

        let (headers, payload) = RequestEnvelope::decode(&frame.payload)?.into_parts();
        let (id, timeout) = request_meta(&headers);

        self.id = id;
        self.timeout = timeout;
        self.headers = headers;
        self.payload = payload;
        self.context = Context::new().with_timeout(timeout);
        Ok(())
    }

    /// Wire request id.
    #[inline]
    pub fn request_id(&self) -> u32 {
        self.source.request_id
    }

    /// Take the body sent by the action, if any.
    pub fn take_response(&mut self) -> Option<Bytes> {
        self.response.take()
    }

    /// Drop per-request state, keeping allocations for reuse.
    pub fn reset(&mut self) {
        self.source.request_id = 0;
        self.source.peer.clear();
        self.action = Bytes::new();
        self.id.clear();
        self.timeout = Duration::ZERO;
        self.headers.clear();
        self.payload = Bytes::new();
        self.context = Context::new();
        self.response = None;
    }
}

impl Request for FrameRequest {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn action(&self) -> &[u8] {
        &self.action
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn set_context(&mut self, ctx: Context) {
        self.context = ctx;
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn source(&self) -> &dyn Any {
        &self.source
    }

    fn send(&mut self, body: Bytes) -> Result<()> {
        self.response = Some(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, HEADER_REQUEST_ID};
    use crate::request::RequestExt;
    use serde_json::json;

    fn frame_for(msg: &Message, request_id: u32) -> Frame {
        Frame::request(
            request_id,
            Bytes::copy_from_slice(msg.action().as_bytes()),
            RequestEnvelope::encode(msg).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_fill_from_frame() {
        let msg = Message::new("hello", &json!({ "name": "Ada" }))
            .unwrap()
            .with_id("id_1")
            .with_timeout(Duration::from_secs(1))
            .with_header("tenant", "acme");

        let mut req = FrameRequest::default();
        req.fill(frame_for(&msg, 9), "127.0.0.1:5000").unwrap();

        assert_eq!(req.request_id(), 9);
        assert_eq!(req.action(), b"hello");
        assert_eq!(req.id(), b"id_1");
        assert_eq!(req.timeout(), Duration::from_secs(1));
        assert_eq!(req.headers()["tenant"], "acme");
        assert_eq!(req.headers()[HEADER_REQUEST_ID], "id_1");
        assert!(req.context().deadline().is_some());

        let data: serde_json::Value = req.bind().unwrap();
        assert_eq!(data, json!({ "name": "Ada" }));

        let source = req.source().downcast_ref::<FrameSource>().unwrap();
        assert_eq!(source.peer, "127.0.0.1:5000");
    }

    #[test]
    fn test_fill_bad_envelope_keeps_routing_fields() {
        let frame = Frame::request(3, Bytes::from_static(b"geo"), Bytes::from_static(b"garbage"))
            .unwrap();

        let mut req = FrameRequest::default();
        assert!(req.fill(frame, "peer").is_err());
        assert_eq!(req.request_id(), 3);
        assert_eq!(req.action(), b"geo");
    }

    #[test]
    fn test_send_and_reset() {
        let msg = Message::from_value("ping", json!(null)).with_id("x");
        let mut req = FrameRequest::default();
        req.fill(frame_for(&msg, 1), "peer").unwrap();

        req.respond("pong").unwrap();
        assert_eq!(req.take_response().unwrap().as_ref(), br#""pong""#);
        assert!(req.take_response().is_none());

        req.respond("again").unwrap();
        req.reset();
        assert!(req.take_response().is_none());
        assert!(req.id().is_empty());
        assert!(req.action().is_empty());
        assert!(req.headers().is_empty());
        assert_eq!(req.request_id(), 0);
    }
}
