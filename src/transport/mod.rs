//! Transports.
//!
//! - [`frame`] - binary frames over TCP or Unix sockets
//! - [`local`] - in-process dispatch, no socket
//!
//! [`Listener`] and [`Stream`] hide the socket family; Unix sockets are only
//! available on Unix targets.

pub mod frame;
pub mod local;

mod listener;

pub use listener::{Listener, Stream};
