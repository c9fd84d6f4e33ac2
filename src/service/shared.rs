//! Copy-on-write service for re-registration while serving.
//!
//! A [`Service`] is frozen once it is shared. [`SharedService`] publishes the
//! current snapshot through an [`ArcSwap`], so dispatch never takes a lock.
//! [`SharedService::update`] clones the snapshot, applies the change to the
//! copy and swaps the copy in. Requests already running keep the snapshot
//! they started with.

use std::fmt;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::debug;

use crate::error::Result;
use crate::request::Request;

use super::action::{ActionResult, BoxFuture};
use super::dispatcher::{Dispatch, Service};

/// A [`Service`] that can be changed after serving has started.
pub struct SharedService {
    current: ArcSwap<Service>,
    // Serializes writers so concurrent updates never drop each other.
    update_lock: Mutex<()>,
}

impl SharedService {
    /// Wrap an initial service.
    pub fn new(service: Service) -> Self {
        Self {
            current: ArcSwap::from_pointee(service),
            update_lock: Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<Service> {
        self.current.load_full()
    }

    /// Replace the whole service.
    pub fn replace(&self, service: Service) {
        let _guard = self.update_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.current.store(Arc::new(service));
    }

    /// Clone the current service, apply `f` to the copy and publish it.
    ///
    /// Readers keep dispatching against the old snapshot while `f` runs. If
    /// `f` fails the current service is left untouched.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Service) -> Result<()>,
    {
        let _guard = self.update_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = Service::clone(&self.current.load());
        f(&mut next)?;
        debug!(
            "Service updated: {} actions, {} middleware",
            next.action_count(),
            next.middleware_count()
        );
        self.current.store(Arc::new(next));
        Ok(())
    }
}

impl fmt::Debug for SharedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedService")
            .field("current", &self.current.load())
            .finish()
    }
}

impl From<Service> for SharedService {
    fn from(service: Service) -> Self {
        Self::new(service)
    }
}

impl Dispatch for SharedService {
    fn dispatch<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult> {
        let snapshot = self.current.load_full();
        Box::pin(async move { snapshot.handle(req).await })
    }
}
