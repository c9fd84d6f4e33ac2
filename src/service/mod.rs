//! Service module - action registration and request dispatch.
//!
//! Provides:
//! - [`Action`] / [`TypedAction`] - units of work bound to an action name
//! - [`Middleware`] - ordered pre-action hooks
//! - [`Service`] - trie router plus middleware chain
//! - [`SharedService`] - copy-on-write service for re-registration at runtime
//! - [`Dispatch`] - what servers run inbound requests through

mod action;
mod dispatcher;
mod middleware;
mod shared;

pub use action::{action_fn, Action, ActionResult, BoxFuture, FnAction, TypedAction};
pub use dispatcher::{Dispatch, Service};
pub use middleware::{middleware_fn, FnMiddleware, Middleware};
pub use shared::SharedService;
