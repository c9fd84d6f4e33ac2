//! Action trait and the two ways of building one.
//!
//! - [`action_fn`] wraps a closure working on the raw request.
//! - [`TypedAction`] binds the payload into `T`, awaits the handler and sends
//!   its `R` output as the response.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::request::{Request, RequestExt};

/// Result type for actions.
pub type ActionResult = Result<()>;

/// Boxed future for action and middleware results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work bound to one action name.
pub trait Action: Send + Sync + 'static {
    /// Handle the request; the response goes out through [`Request::send`].
    fn call<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult>;
}

/// Action built from a closure. See [`action_fn`].
pub struct FnAction<F>(F);

impl<F> Action for FnAction<F>
where
    F: for<'a> Fn(&'a mut dyn Request) -> BoxFuture<'a, ActionResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult> {
        (self.0)(req)
    }
}

/// Wrap a closure as an [`Action`].
///
/// ```ignore
/// service.register("ping", action_fn(|req| Box::pin(async move {
///     req.respond("pong")
/// })))?;
/// ```
pub fn action_fn<F>(f: F) -> FnAction<F>
where
    F: for<'a> Fn(&'a mut dyn Request) -> BoxFuture<'a, ActionResult> + Send + Sync + 'static,
{
    FnAction(f)
}

/// Wrapper that binds the payload before calling the handler and responds
/// with its output.
pub struct TypedAction<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, R, Fut> TypedAction<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    /// Create a new typed action.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, R, Fut> Action for TypedAction<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    fn call<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, ActionResult> {
        let input: T = match req.bind() {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(input);
        Box::pin(async move {
            let output = fut.await?;
            req.respond(&output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XrpcError;
    use crate::transport::local::LocalRequest;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Hello {
        name: String,
    }

    #[tokio::test]
    async fn test_fn_action_sends_response() {
        let action = action_fn(|req| Box::pin(async move { req.respond("pong") }));

        let mut req = LocalRequest::new("ping", serde_json::Value::Null);
        action.call(&mut req).await.unwrap();
        assert_eq!(req.response().unwrap().as_ref(), br#""pong""#);
    }

    #[tokio::test]
    async fn test_typed_action_binds_and_responds() {
        let action = TypedAction::new(|input: Hello| async move {
            Ok(format!("Hello {}!", input.name))
        });

        let mut req = LocalRequest::new("hello", serde_json::json!({ "name": "Ada" }));
        action.call(&mut req).await.unwrap();
        assert_eq!(req.response().unwrap().as_ref(), br#""Hello Ada!""#);
    }

    #[tokio::test]
    async fn test_typed_action_bind_failure() {
        let action = TypedAction::new(|input: Hello| async move { Ok(input.name) });

        let mut req = LocalRequest::new("hello", serde_json::json!([1, 2]));
        let err = action.call(&mut req).await.unwrap_err();
        assert!(matches!(err, XrpcError::Json(_)));
        assert!(req.response().is_none());
    }

    #[tokio::test]
    async fn test_typed_action_handler_error_skips_response() {
        let action = TypedAction::new(|_: Hello| async move {
            Err::<(), _>(XrpcError::Remote("rejected".into()))
        });

        let mut req = LocalRequest::new("hello", serde_json::json!({ "name": "Ada" }));
        let err = action.call(&mut req).await.unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert!(req.response().is_none());
    }
}
