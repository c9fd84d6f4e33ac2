//! Frame transport server.
//!
//! One task per connection reads frames; each request runs in its own task,
//! bounded by a per-connection semaphore; responses go out through the
//! connection's writer task.
//!
//! # Example
//!
//! ```ignore
//! use xrpc::transport::frame::FrameServer;
//!
//! let server = FrameServer::new(Arc::new(service));
//! server.listen("tcp://0.0.0.0:2020").await?;
//! ```

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;

use crate::endpoint::Endpoint;
use crate::error::{Result, XrpcError};
use crate::protocol::{Frame, FrameBuffer, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::request::RequestExt;
use crate::response::error_envelope;
use crate::server::{Outcome, Server};
use crate::service::{BoxFuture, Dispatch};
use crate::transport::listener::{Listener, Stream};
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

use super::arena::{RequestArena, DEFAULT_ARENA_CAPACITY};

/// Default number of requests handled concurrently per connection.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Error text sent when a connection is at capacity.
pub const TOO_MANY_REQUESTS: &str = "too many requests";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Requests handled concurrently per connection.
    pub max_concurrent_requests: usize,
    /// Largest accepted request payload.
    pub max_payload_size: u32,
    /// Idle request objects kept per listener.
    pub arena_capacity: usize,
    /// Writer task settings for each connection.
    pub writer: WriterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            writer: WriterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set the per-connection concurrency limit.
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Set the maximum payload size.
    pub fn with_max_payload_size(mut self, size: u32) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Set the request arena capacity.
    pub fn with_arena_capacity(mut self, capacity: usize) -> Self {
        self.arena_capacity = capacity;
        self
    }

    /// Set the writer configuration.
    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }
}

/// Serves a dispatcher over the frame protocol.
pub struct FrameServer<D: Dispatch> {
    dispatcher: Arc<D>,
    config: ServerConfig,
}

impl<D: Dispatch> Clone for FrameServer<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            config: self.config.clone(),
        }
    }
}

impl<D: Dispatch> FrameServer<D> {
    /// Server with default configuration.
    pub fn new(dispatcher: Arc<D>) -> Self {
        Self::with_config(dispatcher, ServerConfig::default())
    }

    /// Server with explicit configuration.
    pub fn with_config(dispatcher: Arc<D>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Bind `address` without serving yet.
    ///
    /// Useful to learn the actual port of `tcp://127.0.0.1:0` before
    /// calling [`serve`](Self::serve).
    pub async fn bind(&self, address: &str) -> Result<Listener> {
        Listener::bind(&Endpoint::parse(address)).await
    }

    /// Accept connections on `listener` until accepting fails.
    pub async fn serve(&self, listener: Listener) -> Result<()> {
        let arena = Arc::new(RequestArena::new(self.config.arena_capacity));

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    return Err(e);
                }
            };
            tracing::debug!("Accepted connection from {}", peer);

            let conn = Connection {
                dispatcher: Arc::clone(&self.dispatcher),
                arena: Arc::clone(&arena),
                config: self.config.clone(),
                peer: Arc::from(peer),
            };
            tokio::spawn(conn.run(stream));
        }
    }
}

impl<D: Dispatch> Server for FrameServer<D> {
    fn listen<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let listener = self.bind(address).await?;
            self.serve(listener).await
        })
    }
}

struct Connection<D: Dispatch> {
    dispatcher: Arc<D>,
    arena: Arc<RequestArena>,
    config: ServerConfig,
    peer: Arc<str>,
}

impl<D: Dispatch> Connection<D> {
    async fn run(self, stream: Stream) {
        let (reader, write_half) = stream.into_split();
        let (writer, _writer_task) = spawn_writer_task(write_half, self.config.writer.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests));

        match self.read_loop(reader, &writer, &semaphore).await {
            Ok(()) => tracing::debug!("Connection from {} closed", self.peer),
            Err(e) => tracing::warn!("Connection from {} dropped: {}", self.peer, e),
        }
    }

    async fn read_loop<R: tokio::io::AsyncRead + Unpin>(
        &self,
        mut reader: R,
        writer: &WriterHandle,
        semaphore: &Arc<Semaphore>,
    ) -> Result<()> {
        let mut frame_buffer = FrameBuffer::with_max_payload(self.config.max_payload_size);
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await? {
                0 => return Ok(()),
                n => n,
            };

            for frame in frame_buffer.push(&buf[..n])? {
                self.dispatch_frame(frame, writer, semaphore)?;
            }
        }
    }

    fn dispatch_frame(
        &self,
        frame: Frame,
        writer: &WriterHandle,
        semaphore: &Arc<Semaphore>,
    ) -> Result<()> {
        if frame.is_response() {
            tracing::warn!("Received unexpected response frame from {}", self.peer);
            return Ok(());
        }

        let request_id = frame.request_id();
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(
                    "Request capacity reached on {}, rejecting request {}",
                    self.peer,
                    request_id
                );
                let body = error_envelope(&XrpcError::Remote(TOO_MANY_REQUESTS.to_string()));
                return match writer.try_send(Frame::response(request_id, body, true)?) {
                    Err(XrpcError::ConnectionClosed) => Err(XrpcError::ConnectionClosed),
                    _ => Ok(()),
                };
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let arena = Arc::clone(&self.arena);
        let peer = Arc::clone(&self.peer);
        let writer = writer.clone();

        tokio::spawn(async move {
            let _permit = permit;

            let mut req = arena.acquire();
            let result = match req.fill(frame, &peer) {
                Ok(()) => dispatcher.dispatch(&mut req).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                if !e.is_action_not_found() {
                    tracing::debug!("Action '{}' from {} failed: {}", req.action_name(), peer, e);
                }
            }

            let outcome = Outcome::from_dispatch(result, req.take_response());
            arena.release(req);

            if let Err(e) = send_outcome(&writer, request_id, outcome).await {
                tracing::error!("Failed to send response {} to {}: {}", request_id, peer, e);
            }
        });

        Ok(())
    }
}

async fn send_outcome(writer: &WriterHandle, request_id: u32, outcome: Outcome) -> Result<()> {
    let frame = match Frame::response(request_id, outcome.body, outcome.is_error) {
        Ok(frame) => frame,
        Err(e) => Frame::response(request_id, error_envelope(&e), true)?,
    };
    writer.send(frame).await
}
