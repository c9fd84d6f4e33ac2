//! The [`Service`] dispatcher.
//!
//! # Example
//!
//! ```ignore
//! use xrpc::service::{action_fn, Service};
//!
//! let mut service = Service::new();
//!
//! service.register_typed("hello", |input: Hello| async move {
//!     Ok(format!("Hello {}!", input.name))
//! })?;
//! service.use_middleware(RequireTenant);
//!
//! let service = Arc::new(service);
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, XrpcError};
use crate::request::{Request, RequestExt};
use crate::router::ActionTrie;

use super::action::{Action, ActionResult, BoxFuture, TypedAction};
use super::middleware::Middleware;

/// Something that can take an inbound request and run it to completion.
///
/// Servers are generic over this so they accept both a frozen [`Service`] and
/// a [`SharedService`](super::SharedService).
pub trait Dispatch: Send + Sync + 'static {
    /// Route `req` and run it through middleware and the action.
    fn dispatch<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult>;
}

/// Action router plus an ordered middleware chain.
///
/// Registration takes `&mut self`; once the service is wrapped in an `Arc`
/// and handed to a server it is read-only.
#[derive(Clone, Default)]
pub struct Service {
    router: ActionTrie<Arc<dyn Action>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Service {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `action` to `name`. A second registration under the same name
    /// replaces the first.
    ///
    /// # Errors
    ///
    /// [`XrpcError::EmptyActionName`] if `name` is empty.
    pub fn register<A: Action>(&mut self, name: &str, action: A) -> Result<()> {
        self.register_arc(name, Arc::new(action))
    }

    /// Like [`register`](Self::register) for an action that is already shared.
    pub fn register_arc(&mut self, name: &str, action: Arc<dyn Action>) -> Result<()> {
        if self.router.insert(name.as_bytes(), action)?.is_some() {
            warn!("Action '{}' registered twice, previous handler replaced", name);
        }
        Ok(())
    }

    /// Register a typed handler: the payload is bound into `T` and the
    /// returned `R` is sent as the response.
    pub fn register_typed<F, T, R, Fut>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.register(name, TypedAction::new(handler))
    }

    /// Append a middleware. Middleware run in registration order.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) {
        self.middleware.push(Arc::new(middleware));
    }

    /// Append an already-shared middleware. `None` is ignored.
    pub fn use_shared(&mut self, middleware: Option<Arc<dyn Middleware>>) {
        if let Some(middleware) = middleware {
            self.middleware.push(middleware);
        }
    }

    /// Whether an action is bound to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.router.get(name.as_bytes()).is_some()
    }

    /// Number of registered actions.
    pub fn action_count(&self) -> usize {
        self.router.len()
    }

    /// Number of middleware in the chain.
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Route and run one request.
    ///
    /// An unknown action fails with [`XrpcError::ActionNotFound`] before any
    /// middleware runs. The first middleware error is returned unchanged.
    pub async fn handle(&self, req: &mut dyn Request) -> ActionResult {
        let action = match self.router.get(req.action()) {
            Some(action) => action,
            None => {
                debug!("No action registered for '{}'", req.action_name());
                return Err(XrpcError::ActionNotFound);
            }
        };

        for middleware in &self.middleware {
            middleware.handle(req).await?;
        }

        action.call(req).await
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("actions", &self.router.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl Dispatch for Service {
    fn dispatch<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult> {
        Box::pin(self.handle(req))
    }
}

impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    fn dispatch<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult> {
        (**self).dispatch(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{action_fn, middleware_fn};
    use crate::transport::local::LocalRequest;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Deserialize)]
    struct Hello {
        name: String,
    }

    fn hello_service() -> Service {
        let mut service = Service::new();
        service
            .register_typed("hello", |input: Hello| async move {
                Ok(format!("Hello {}!", input.name))
            })
            .unwrap();
        service
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Middleware {
        let log = Arc::clone(log);
        middleware_fn(move |_req| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(tag);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_handle_typed_action() {
        let service = hello_service();

        let mut req = LocalRequest::new("hello", serde_json::json!({ "name": "Ada" }));
        service.handle(&mut req).await.unwrap();
        assert_eq!(req.response().unwrap().as_ref(), br#""Hello Ada!""#);
    }

    #[tokio::test]
    async fn test_unknown_action_skips_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut service = hello_service();
        service.use_middleware(recorder(&log, "m1"));

        let mut req = LocalRequest::new("goodbye", serde_json::Value::Null);
        let err = service.handle(&mut req).await.unwrap_err();
        assert!(err.is_action_not_found());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_through_prefix_is_not_found() {
        let mut service = Service::new();
        service
            .register("abcdef", action_fn(|req| Box::pin(async move { req.respond(&1) })))
            .unwrap();

        let mut req = LocalRequest::new("abc", serde_json::Value::Null);
        assert!(service.handle(&mut req).await.unwrap_err().is_action_not_found());
    }

    #[tokio::test]
    async fn test_middleware_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut service = hello_service();
        service.use_middleware(recorder(&log, "m1"));
        service.use_middleware(recorder(&log, "m2"));
        service.use_middleware(recorder(&log, "m3"));

        let mut req = LocalRequest::new("hello", serde_json::json!({ "name": "Ada" }));
        service.handle(&mut req).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_middleware_error_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let called = Arc::new(Mutex::new(false));

        let mut service = Service::new();
        let flag = Arc::clone(&called);
        service
            .register(
                "hello",
                action_fn(move |_req| {
                    let flag = Arc::clone(&flag);
                    Box::pin(async move {
                        *flag.lock().unwrap() = true;
                        Ok(())
                    })
                }),
            )
            .unwrap();
        service.use_middleware(recorder(&log, "m1"));
        service.use_middleware(middleware_fn(|_req| {
            Box::pin(async move { Err(XrpcError::Remote("forbidden".into())) })
        }));
        service.use_middleware(recorder(&log, "m3"));

        let mut req = LocalRequest::new("hello", serde_json::Value::Null);
        let err = service.handle(&mut req).await.unwrap_err();
        assert_eq!(err.to_string(), "forbidden");
        assert_eq!(*log.lock().unwrap(), vec!["m1"]);
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_use_shared_ignores_none() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut service = hello_service();
        service.use_shared(None);
        service.use_shared(Some(Arc::new(recorder(&log, "shared"))));
        assert_eq!(service.middleware_count(), 1);

        let mut req = LocalRequest::new("hello", serde_json::json!({ "name": "Ada" }));
        service.handle(&mut req).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["shared"]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_last_wins() {
        let mut service = Service::new();
        service
            .register("ping", action_fn(|req| Box::pin(async move { req.respond("one") })))
            .unwrap();
        service
            .register("ping", action_fn(|req| Box::pin(async move { req.respond("two") })))
            .unwrap();
        assert_eq!(service.action_count(), 1);

        let mut req = LocalRequest::new("ping", serde_json::Value::Null);
        service.handle(&mut req).await.unwrap();
        assert_eq!(req.response().unwrap().as_ref(), br#""two""#);
    }

    #[test]
    fn test_register_empty_name() {
        let mut service = Service::new();
        let err = service
            .register("", action_fn(|_req| Box::pin(async move { Ok(()) })))
            .unwrap_err();
        assert!(matches!(err, XrpcError::EmptyActionName));
    }

    #[tokio::test]
    async fn test_action_error_returned() {
        let mut service = Service::new();
        service
            .register(
                "fail",
                action_fn(|_req| Box::pin(async move { Err(XrpcError::Remote("boom".into())) })),
            )
            .unwrap();

        let mut req = LocalRequest::new("fail", serde_json::Value::Null);
        let err = service.dispatch(&mut req).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
