//! Binary frame transport over TCP and Unix sockets.
//!
//! Requests travel as frames with an 11-byte header, the action name and a
//! JSON [`RequestEnvelope`](crate::protocol::RequestEnvelope); responses
//! carry the reply body, flagged when it is an error envelope. One
//! connection multiplexes any number of in-flight calls by request id.

mod arena;
mod client;
mod request;
mod server;

pub use arena::{RequestArena, DEFAULT_ARENA_CAPACITY};
pub use client::{ClientConfig, FrameClient, FrameConnector, DEFAULT_CONNECT_TIMEOUT};
pub use request::{FrameRequest, FrameSource};
pub use server::{FrameServer, ServerConfig, DEFAULT_MAX_CONCURRENT_REQUESTS, TOO_MANY_REQUESTS};
