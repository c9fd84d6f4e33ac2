//! Middleware run before every action.
//!
//! A middleware sees the request before the action does. It may inspect
//! headers, replace the [`Context`](crate::context::Context) or send a
//! response. Returning `Err` stops the chain and the action is never called.

use crate::request::Request;

use super::action::{ActionResult, BoxFuture};

/// Pre-action hook.
pub trait Middleware: Send + Sync + 'static {
    /// Inspect or modify the request. `Err` short-circuits the chain.
    fn handle<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult>;
}

/// Middleware built from a closure. See [`middleware_fn`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut dyn Request) -> BoxFuture<'a, ActionResult> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult> {
        (self.0)(req)
    }
}

/// Wrap a closure as a [`Middleware`].
///
/// ```ignore
/// service.use_middleware(middleware_fn(|req| Box::pin(async move {
///     if req.headers().contains_key("token") {
///         Ok(())
///     } else {
///         Err(XrpcError::Remote("unauthenticated".into()))
///     }
/// })));
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut dyn Request) -> BoxFuture<'a, ActionResult> + Send + Sync + 'static,
{
    FnMiddleware(f)
}
