//! Per-request context: cancellation, deadline and typed values.
//!
//! A [`Context`] travels with every inbound request. Middleware can attach
//! values for later middleware or the action:
//!
//! ```
//! use xrpc::Context;
//!
//! #[derive(Debug, PartialEq)]
//! struct UserId(u64);
//!
//! let ctx = Context::new().with_value(UserId(7));
//! assert_eq!(ctx.value::<UserId>(), Some(&UserId(7)));
//!
//! let token = ctx.clone();
//! token.cancel();
//! assert!(ctx.is_cancelled());
//! ```
//!
//! Clones share the same cancellation state. Values are copy-on-write: a
//! `with_value` call never changes contexts that were cloned earlier.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

type Values = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Cancellation and value carrier attached to a request.
#[derive(Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<Values>,
}

impl Context {
    /// Create an empty, non-cancelled context without deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context whose deadline is `timeout` from now.
    ///
    /// A zero timeout leaves the deadline unset.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut ctx = self.clone();
        if !timeout.is_zero() {
            ctx.deadline = Some(Instant::now() + timeout);
        }
        ctx
    }

    /// Derive a context carrying `value`, replacing any value of the same type.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values = Values::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            values: Arc::new(values),
        }
    }

    /// Get a value previously attached with [`with_value`](Self::with_value).
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Deadline derived from the request timeout, if any.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline (`None` without deadline).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Signal cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once [`cancel`](Self::cancel) was called or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Wait until the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish()
    }
}
