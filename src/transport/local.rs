//! In-process transport.
//!
//! [`LocalClient`] runs messages straight through a dispatcher without a
//! socket. Payloads still go through the JSON codec so actions observe the
//! same bytes they would over the wire.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;

use crate::client::{resolve_timeout, Client};
use crate::codec::JsonCodec;
use crate::context::Context;
use crate::error::{Result, XrpcError};
use crate::message::{request_meta, Headers, Message};
use crate::request::Request;
use crate::response::Reply;
use crate::server::Outcome;
use crate::service::{BoxFuture, Dispatch};

/// [`Request`] built directly from a message.
#[derive(Debug, Default)]
pub struct LocalRequest {
    action: String,
    id: Vec<u8>,
    timeout: Duration,
    headers: Headers,
    payload: Bytes,
    context: Context,
    response: Option<Bytes>,
}

impl LocalRequest {
    /// Request for `action` with `data` as payload and no headers.
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            payload: Bytes::from(data.to_string()),
            ..Self::default()
        }
    }

    /// Request mirroring what a server would decode from `msg`.
    pub fn from_message(msg: &Message) -> Result<Self> {
        let headers = msg.wire_headers();
        let (id, timeout) = request_meta(&headers);
        Ok(Self {
            action: msg.action().to_string(),
            id,
            timeout,
            headers,
            payload: JsonCodec::encode_bytes(msg.data())?,
            context: Context::new().with_timeout(timeout),
            response: None,
        })
    }

    /// Body sent by the action, if any.
    pub fn response(&self) -> Option<&Bytes> {
        self.response.as_ref()
    }

    /// Take the body sent by the action.
    pub fn take_response(&mut self) -> Option<Bytes> {
        self.response.take()
    }
}

impl Request for LocalRequest {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn action(&self) -> &[u8] {
        self.action.as_bytes()
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
        self
    }

    fn send(&mut self, body: Bytes) -> Result<()> {
        self.response = Some(body);
        Ok(())
    }
}

/// [`Client`] that dispatches in-process.
pub struct LocalClient<D: Dispatch> {
    dispatcher: Arc<D>,
    timeout: Duration,
}

impl<D: Dispatch> LocalClient<D> {
    /// Client over `dispatcher`.
    pub fn new(dispatcher: Arc<D>) -> Self {
        Self {
            dispatcher,
            timeout: Duration::ZERO,
        }
    }

    /// Set the timeout for messages that carry none.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call(&self, msg: Message) -> Reply {
        let timeout = resolve_timeout(msg.timeout(), self.timeout);
        let mut req = match LocalRequest::from_message(&msg) {
            Ok(req) => req,
            Err(e) => return Reply::failed(e),
        };
        // The deadline alone decides a timeout, also for actions that
        // return early once the context fires.
        let ctx = req.context().with_timeout(timeout);
        req.set_context(ctx.clone());

        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                ctx.cancel();
                return Reply::failed(XrpcError::Timeout(timeout));
            }
            result = self.dispatcher.dispatch(&mut req) => result,
        };

        Reply::new(Outcome::from_dispatch(result, req.take_response()).body)
    }
}

impl<D: Dispatch> Client for LocalClient<D> {
    type Response = Reply;

    fn send(&self, msg: Message) -> BoxFuture<'_, Reply> {
        Box::pin(self.call(msg))
    }
}
