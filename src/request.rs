//! Inbound call view exposed to middleware and actions.
//!
//! Transports implement [`Request`]; handlers usually go through the
//! [`RequestExt`] helpers to decode the payload and send a typed response:
//!
//! ```ignore
//! async fn hello(req: &mut dyn Request) -> Result<()> {
//!     let input: Hello = req.bind()?;
//!     req.respond(&format!("Hello {}!", input.name))
//! }
//! ```

use std::any::Any;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::JsonCodec;
use crate::context::Context;
use crate::error::Result;
use crate::message::Headers;

/// Inbound request as seen by the dispatcher, middleware and actions.
///
/// Owned by the transport for the duration of one call and lent out as
/// `&mut dyn Request`.
pub trait Request: Send {
    /// Correlation id (empty if the caller set none).
    fn id(&self) -> &[u8];

    /// Action name used for routing.
    fn action(&self) -> &[u8];

    /// Caller's timeout (zero if unset).
    fn timeout(&self) -> Duration;

    /// Context carrying cancellation and values set by middleware.
    fn context(&self) -> &Context;

    /// Replace the context.
    fn set_context(&mut self, ctx: Context);

    /// Request headers.
    fn headers(&self) -> &Headers;

    /// Raw payload bytes (JSON).
    fn payload(&self) -> &[u8];

    /// Underlying transport object, for transport-specific access.
    fn source(&self) -> &dyn Any;

    /// Send the response body. The last call before the action returns wins.
    fn send(&mut self, body: Bytes) -> Result<()>;
}

/// Typed helpers available on every [`Request`], including `dyn Request`.
pub trait RequestExt: Request {
    /// Decode the payload into `T`.
    fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        JsonCodec::decode(self.payload())
    }

    /// Encode `value` as JSON and send it as the response.
    fn respond<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let body = JsonCodec::encode_bytes(value)?;
        self.send(body)
    }

    /// Action name as UTF-8 (lossy), for logging.
    fn action_name(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.action())
    }
}

impl<R: Request + ?Sized> RequestExt for R {}
