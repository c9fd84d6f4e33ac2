//! Free-list of request objects owned by one listener.
//!
//! Each accepted request takes a [`FrameRequest`] from the arena and gives it
//! back once its response is queued, so steady-state serving reuses the
//! header map and id buffers instead of allocating them per call.

use std::sync::Mutex;

use super::request::FrameRequest;

/// Default number of idle requests kept per listener.
pub const DEFAULT_ARENA_CAPACITY: usize = 256;

/// Bounded free-list of [`FrameRequest`]s.
#[derive(Debug)]
pub struct RequestArena {
    free: Mutex<Vec<FrameRequest>>,
    capacity: usize,
}

impl RequestArena {
    /// Arena keeping at most `capacity` idle requests.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity.min(DEFAULT_ARENA_CAPACITY))),
            capacity,
        }
    }

    /// Take an idle request, or a fresh one if none is idle.
    pub fn acquire(&self) -> FrameRequest {
        self.free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_default()
    }

    /// Reset `req` and keep it for reuse. Dropped when the arena is full.
    pub fn release(&self, mut req: FrameRequest) {
        req.reset();
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < self.capacity {
            free.push(req);
        }
    }

    /// Number of idle requests.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RequestArena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY)
    }
}
