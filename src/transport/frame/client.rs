//! Frame transport client.
//!
//! A [`FrameClient`] keeps one multiplexed connection to its endpoint. The
//! connection is dialled on first send and again after it breaks. Responses
//! are matched to callers by request id.
//!
//! # Example
//!
//! ```ignore
//! use xrpc::transport::frame::FrameClient;
//! use xrpc::{Client, Message, ResponseExt};
//!
//! let client = FrameClient::new("tcp://127.0.0.1:2020");
//! let resp = client.send(Message::new("hello", &json!({ "name": "Ada" }))?).await;
//! let greeting: Greeting = resp.bind()?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;

use crate::client::{resolve_timeout, Client};
use crate::endpoint::Endpoint;
use crate::error::{Result, XrpcError};
use crate::message::Message;
use crate::pool::{Backend, Connector};
use crate::protocol::{Frame, FrameBuffer, RequestEnvelope, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::response::Reply;
use crate::service::BoxFuture;
use crate::transport::listener::Stream;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Default time allowed for dialling a backend.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for messages that carry none (zero = 100 ms minimum).
    pub timeout: Duration,
    /// Time allowed for dialling.
    pub connect_timeout: Duration,
    /// Largest payload sent or accepted. Should match the server's limit.
    pub max_payload_size: u32,
    /// Writer task settings.
    pub writer: WriterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            writer: WriterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Set the default message timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the dial timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum payload size in both directions.
    pub fn with_max_payload_size(mut self, size: u32) -> Self {
        self.max_payload_size = size;
        self
    }
}

type PendingMap = Mutex<HashMap<u32, oneshot::Sender<Frame>>>;

struct Connection {
    writer: WriterHandle,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.writer.is_closed()
    }
}

/// Removes a pending entry when the call finishes, times out or is dropped.
struct PendingGuard {
    pending: Arc<PendingMap>,
    request_id: u32,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.request_id);
    }
}

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<u32, oneshot::Sender<Frame>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Multiplexed client for one frame-transport endpoint.
pub struct FrameClient {
    endpoint: Endpoint,
    config: ClientConfig,
    conn: tokio::sync::Mutex<Option<Arc<Connection>>>,
    next_id: AtomicU32,
}

impl FrameClient {
    /// Client for `address` with default configuration. Does not dial.
    pub fn new(address: &str) -> Self {
        Self::with_config(Endpoint::parse(address), ClientConfig::default())
    }

    /// Client for `endpoint` with explicit configuration. Does not dial.
    pub fn with_config(endpoint: Endpoint, config: ClientConfig) -> Self {
        Self {
            endpoint,
            config,
            conn: tokio::sync::Mutex::new(None),
            next_id: AtomicU32::new(1),
        }
    }

    /// Endpoint this client dials.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether a live connection is currently held.
    pub async fn is_connected(&self) -> bool {
        match self.conn.lock().await.as_ref() {
            Some(conn) => !conn.is_closed(),
            None => false,
        }
    }

    /// Drop the current connection. The next send dials again.
    pub async fn close(&self) {
        self.conn.lock().await.take();
    }

    fn next_request_id(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            if !conn.is_closed() {
                return Ok(Arc::clone(conn));
            }
            tracing::debug!("Connection to {} closed, redialling", self.endpoint);
        }

        let stream = tokio::time::timeout(self.config.connect_timeout, Stream::connect(&self.endpoint))
            .await
            .map_err(|_| XrpcError::Timeout(self.config.connect_timeout))??;
        tracing::debug!("Connected to {}", self.endpoint);

        let (reader, write_half) = stream.into_split();
        let (writer, _writer_task) = spawn_writer_task(write_half, self.config.writer.clone());
        let pending: Arc<PendingMap> = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(read_responses(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
            self.config.max_payload_size,
            self.endpoint.to_string(),
        ));

        let conn = Arc::new(Connection {
            writer,
            pending,
            closed,
        });
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    async fn call(&self, msg: Message, timeout: Duration) -> Result<Frame> {
        let payload = RequestEnvelope::encode(&msg)?;
        if payload.len() > self.config.max_payload_size as usize {
            return Err(XrpcError::Protocol(format!(
                "request payload of {} bytes exceeds limit of {} bytes",
                payload.len(),
                self.config.max_payload_size
            )));
        }
        let action = Bytes::copy_from_slice(msg.action().as_bytes());

        let exchange = async {
            let conn = self.connection().await?;
            let request_id = self.next_request_id();
            let frame = Frame::request(request_id, action, payload)?;

            let (tx, rx) = oneshot::channel();
            lock(&conn.pending).insert(request_id, tx);
            let _guard = PendingGuard {
                pending: Arc::clone(&conn.pending),
                request_id,
            };
            if conn.closed.load(Ordering::SeqCst) {
                return Err(XrpcError::ConnectionClosed);
            }

            conn.writer.send(frame).await?;
            rx.await.map_err(|_| XrpcError::ConnectionClosed)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| XrpcError::Timeout(timeout))?
    }

    async fn exchange(&self, msg: Message, timeout: Duration) -> Reply {
        match self.call(msg, timeout).await {
            Ok(frame) => Reply::new(frame.payload).with_source(frame.header),
            Err(e) => {
                tracing::debug!("Call to {} failed: {}", self.endpoint, e);
                Reply::failed(e)
            }
        }
    }
}

impl Client for FrameClient {
    type Response = Reply;

    fn send(&self, msg: Message) -> BoxFuture<'_, Reply> {
        let timeout = resolve_timeout(msg.timeout(), self.config.timeout);
        Box::pin(self.exchange(msg, timeout))
    }
}

impl Backend for FrameClient {
    type Response = Reply;

    fn send_timeout(&self, msg: Message, timeout: Duration) -> BoxFuture<'_, Reply> {
        Box::pin(self.exchange(msg, timeout))
    }
}

impl std::fmt::Debug for FrameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClient")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish()
    }
}

/// Reads response frames and completes the matching pending calls.
///
/// On exit every still-pending call fails with `ConnectionClosed`.
async fn read_responses<R: tokio::io::AsyncRead + Unpin>(
    mut reader: R,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
    max_payload_size: u32,
    endpoint: String,
) {
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; 64 * 1024];

    let result: Result<()> = async {
        loop {
            let n = match reader.read(&mut buf).await? {
                0 => return Ok(()),
                n => n,
            };

            for frame in frame_buffer.push(&buf[..n])? {
                if !frame.is_response() {
                    tracing::warn!("Received unexpected request frame from {}", endpoint);
                    continue;
                }
                let request_id = frame.request_id();
                match lock(&pending).remove(&request_id) {
                    Some(tx) => {
                        let _ = tx.send(frame);
                    }
                    None => tracing::debug!("Dropping late response {} from {}", request_id, endpoint),
                }
            }
        }
    }
    .await;

    if let Err(e) = result {
        tracing::warn!("Connection to {} failed: {}", endpoint, e);
    }

    closed.store(true, Ordering::SeqCst);
    lock(&pending).clear();
}

/// Builds [`FrameClient`] backends for a [`ConnectionPool`](crate::pool::ConnectionPool).
#[derive(Debug, Clone, Default)]
pub struct FrameConnector {
    config: ClientConfig,
}

impl FrameConnector {
    /// Connector whose clients use `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl Connector for FrameConnector {
    type Backend = FrameClient;

    fn connect(&self, endpoint: &Endpoint) -> FrameClient {
        FrameClient::with_config(endpoint.clone(), self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use crate::transport::listener::Listener;

    #[test]
    fn test_request_ids_skip_zero() {
        let client = FrameClient::new("127.0.0.1:1");
        client.next_id.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(client.next_request_id(), u32::MAX);
        assert_eq!(client.next_request_id(), 1);
    }

    #[tokio::test]
    async fn test_oversized_request_rejected_before_dial() {
        let config = ClientConfig::default().with_max_payload_size(1024);
        let client = FrameClient::with_config(Endpoint::parse("127.0.0.1:1"), config);

        let msg = Message::from_value("upload", serde_json::Value::from("x".repeat(4096)));
        let resp = client.send(msg).await;
        match resp.error() {
            Some(XrpcError::Protocol(text)) => assert!(text.contains("exceeds limit of 1024")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_unsupported_network_reported_in_response() {
        let client = FrameClient::new("udp://127.0.0.1:9");
        let resp = client.send(Message::from_value("ping", serde_json::Value::Null)).await;
        assert!(matches!(resp.error(), Some(XrpcError::UnsupportedNetwork(_))));
    }

    #[tokio::test]
    async fn test_timeout_without_answer() {
        // Accepts but never answers.
        let listener = Listener::bind(&Endpoint::parse("127.0.0.1:0")).await.unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        let _server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = FrameClient::with_config(endpoint, ClientConfig::default());
        let msg = Message::from_value("ping", serde_json::Value::Null)
            .with_timeout(Duration::from_millis(50));
        let resp = client.send(msg).await;
        assert!(matches!(resp.error(), Some(XrpcError::Timeout(_))));

        let conn = client.conn.lock().await.clone().unwrap();
        assert!(lock(&conn.pending).is_empty());
    }

    #[tokio::test]
    async fn test_broken_connection_fails_pending() {
        let listener = Listener::bind(&Endpoint::parse("127.0.0.1:0")).await.unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(stream);
        });

        let client = FrameClient::new(&endpoint.to_string());
        let msg = Message::from_value("ping", serde_json::Value::Null)
            .with_timeout(Duration::from_secs(2));
        let resp = client.send(msg).await;
        assert!(matches!(resp.error(), Some(XrpcError::ConnectionClosed)));
        assert!(resp.body().is_err());
        assert!(!client.is_connected().await);
    }
}
