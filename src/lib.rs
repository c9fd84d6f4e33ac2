//! # xrpc
//!
//! Transport-agnostic action RPC.
//!
//! Callers send a named action plus a JSON payload; a [`Service`] resolves
//! the action through a byte-chunked trie, runs its middleware chain and
//! then the action. Outbound calls can be spread over several backends with
//! a round-robin [`ConnectionPool`].
//!
//! ## Architecture
//!
//! - **Router** ([`router`]): prefix tree keyed by 3-byte chunks of the action name
//! - **Dispatcher** ([`service`]): ordered middleware, then the action
//! - **Pool** ([`pool`]): fixed slots, lazily connected, bound to endpoints round-robin
//! - **Transports** ([`transport`]): binary frames over TCP/Unix sockets, or in-process
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use xrpc::transport::frame::{FrameConnector, FrameServer};
//! use xrpc::{ConnectionPool, Message, PoolConfig, ResponseExt, Server, Service};
//!
//! #[tokio::main]
//! async fn main() -> xrpc::Result<()> {
//!     let mut service = Service::new();
//!     service.register_typed("hello", |input: Hello| async move {
//!         Ok(format!("Hello {}!", input.name))
//!     })?;
//!
//!     let server = FrameServer::new(Arc::new(service));
//!     tokio::spawn(async move { server.listen("tcp://127.0.0.1:2020").await });
//!
//!     let pool = ConnectionPool::new(
//!         FrameConnector::default(),
//!         PoolConfig::new(2),
//!         ["tcp://127.0.0.1:2020"],
//!     )?;
//!     let resp = pool.send(Message::new("hello", &Hello { name: "Ada".into() })?).await;
//!     let greeting: String = resp.bind()?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod pool;
pub mod protocol;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod service;
pub mod transport;
pub mod writer;

pub use client::Client;
pub use context::Context;
pub use endpoint::{Endpoint, Network};
pub use error::{Result, XrpcError};
pub use message::{Headers, Message};
pub use pool::{Backend, ConnectionPool, Connector, PoolConfig};
pub use request::{Request, RequestExt};
pub use response::{Reply, Response, ResponseExt};
pub use router::ActionTrie;
pub use server::Server;
pub use service::{action_fn, middleware_fn, Action, Dispatch, Middleware, Service, SharedService};
