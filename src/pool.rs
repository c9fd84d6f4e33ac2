//! Multi-backend client pool.
//!
//! A [`ConnectionPool`] owns a fixed number of slots. Each send takes the next
//! slot round-robin; a slot's backend is created on first use and bound to
//! `endpoints[slot % endpoints.len()]` for the life of the pool.
//!
//! # Example
//!
//! ```ignore
//! use xrpc::pool::{ConnectionPool, PoolConfig};
//! use xrpc::transport::frame::FrameConnector;
//!
//! let pool = ConnectionPool::new(
//!     FrameConnector::default(),
//!     PoolConfig::new(4),
//!     ["tcp://10.0.0.1:2020", "tcp://10.0.0.2:2020"],
//! )?;
//!
//! let resp = pool.send(Message::new("hello", &json!({ "name": "Ada" }))?).await;
//! let mut batch = pool.send_batch(messages);
//! while let Some(resp) = batch.recv().await { /* ... */ }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::client::{resolve_timeout, Client};
use crate::endpoint::Endpoint;
use crate::error::{Result, XrpcError};
use crate::message::Message;
use crate::response::Response;
use crate::service::BoxFuture;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of backend slots.
    pub slots: usize,
    /// Timeout used when a message carries none.
    pub batch_delay: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            slots: 1,
            batch_delay: Duration::ZERO,
        }
    }
}

impl PoolConfig {
    /// Config with `slots` slots.
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            ..Self::default()
        }
    }

    /// Set the fallback timeout.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}

/// One transport client bound to one endpoint.
pub trait Backend: Send + Sync + 'static {
    /// Response produced by this backend.
    type Response: Response + 'static;

    /// Send `msg` and wait at most `timeout` for the response.
    fn send_timeout(&self, msg: Message, timeout: Duration) -> BoxFuture<'_, Self::Response>;
}

/// Creates backends for pool slots.
///
/// `connect` must not block; backends dial lazily on first send.
pub trait Connector: Send + Sync + 'static {
    /// Backend type created.
    type Backend: Backend;

    /// Create a backend for `endpoint`.
    fn connect(&self, endpoint: &Endpoint) -> Self::Backend;
}

/// Round-robin pool of lazily created backends.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    endpoints: Vec<Endpoint>,
    slots: Box<[OnceLock<Arc<C::Backend>>]>,
    next: AtomicUsize,
    init_lock: Mutex<()>,
    batch_delay: Duration,
}

impl<C: Connector> ConnectionPool<C> {
    /// Create a pool over `addresses`.
    ///
    /// Addresses are parsed with [`Endpoint::parse`]. No backend is created
    /// until the first send.
    ///
    /// # Errors
    ///
    /// [`XrpcError::Config`] if `config.slots` is zero or `addresses` is empty.
    pub fn new<I, S>(connector: C, config: PoolConfig, addresses: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints: Vec<Endpoint> = addresses
            .into_iter()
            .map(|addr| Endpoint::parse(addr.as_ref()))
            .collect();

        if config.slots == 0 {
            return Err(XrpcError::Config("pool needs at least one slot".into()));
        }
        if endpoints.is_empty() {
            return Err(XrpcError::Config("pool needs at least one address".into()));
        }

        let slots = (0..config.slots).map(|_| OnceLock::new()).collect();

        Ok(Self {
            connector,
            endpoints,
            slots,
            next: AtomicUsize::new(0),
            init_lock: Mutex::new(()),
            batch_delay: config.batch_delay,
        })
    }

    /// Number of slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Configured endpoints, in order.
    #[inline]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Endpoint bound to `slot`, or `None` if out of range.
    pub fn slot_endpoint(&self, slot: usize) -> Option<&Endpoint> {
        if slot < self.slots.len() {
            Some(&self.endpoints[slot % self.endpoints.len()])
        } else {
            None
        }
    }

    /// Number of slots whose backend has been created.
    pub fn initialized_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Fallback timeout for messages without one.
    #[inline]
    pub fn batch_delay(&self) -> Duration {
        self.batch_delay
    }

    /// Send every message on one backend concurrently.
    ///
    /// The whole batch takes a single round-robin step. Responses arrive in
    /// completion order; the receiver yields `None` once all are delivered.
    /// Must be called from within a tokio runtime.
    pub fn send_batch<I>(&self, messages: I) -> mpsc::Receiver<<C::Backend as Backend>::Response>
    where
        I: IntoIterator<Item = Message>,
    {
        let messages: Vec<Message> = messages.into_iter().collect();
        let (tx, rx) = mpsc::channel(messages.len().max(1));
        let backend = self.select();
        let batch_delay = self.batch_delay;

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for msg in messages {
                let backend = Arc::clone(&backend);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let timeout = resolve_timeout(msg.timeout(), batch_delay);
                    let resp = backend.send_timeout(msg, timeout).await;
                    // Receiver may be gone; the response is dropped then.
                    let _ = tx.send(resp).await;
                });
            }
            drop(tx);

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Batch send task failed: {}", e);
                }
            }
        });

        rx
    }

    /// Take the next slot and return its backend, creating it if needed.
    fn select(&self) -> Arc<C::Backend> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.backend(index)
    }

    fn backend(&self, index: usize) -> Arc<C::Backend> {
        let slot = &self.slots[index];
        if let Some(backend) = slot.get() {
            return Arc::clone(backend);
        }

        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(backend) = slot.get() {
            return Arc::clone(backend);
        }

        let endpoint = &self.endpoints[index % self.endpoints.len()];
        debug!("Pool slot {} connecting to {}", index, endpoint);
        let backend = Arc::new(self.connector.connect(endpoint));
        let _ = slot.set(Arc::clone(&backend));
        backend
    }
}

impl<C: Connector> Client for ConnectionPool<C> {
    type Response = <C::Backend as Backend>::Response;

    fn send(&self, msg: Message) -> BoxFuture<'_, Self::Response> {
        let backend = self.select();
        let timeout = resolve_timeout(msg.timeout(), self.batch_delay);
        Box::pin(async move { backend.send_timeout(msg, timeout).await })
    }
}

impl<C: Connector> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoints", &self.endpoints)
            .field("slots", &self.slots.len())
            .field("initialized", &self.initialized_slots())
            .field("batch_delay", &self.batch_delay)
            .finish()
    }
}
