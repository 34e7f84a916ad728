//! Middleware trait and utilities

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Body type alias
pub type Body = Full<Bytes>;

/// Middleware trait for request/response processing
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process a request
    ///
    /// # Arguments
    ///
    /// * `req` - The incoming HTTP request
    /// * `next` - The next middleware/handler in the chain
    ///
    /// # Returns
    ///
    /// Returns the HTTP response or an error
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>>;
}

/// Boxed future produced by a final handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send>>;

/// Type alias for the final handler function
pub type HandlerFn = Box<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// Box an async function as a final handler
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>>> + Send + 'static,
{
    Box::new(move |req: Request<Body>| -> HandlerFuture { Box::pin(f(req)) })
}

/// Represents the next middleware/handler in the chain
pub struct Next {
    middleware_stack: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    final_handler: Option<Arc<HandlerFn>>,
}

impl Next {
    /// Create a new Next from a middleware stack
    pub fn new(middleware_stack: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self {
            middleware_stack,
            index: 0,
            final_handler: None,
        }
    }

    /// Create a new Next with a final handler
    pub fn with_handler(middleware_stack: Arc<[Arc<dyn Middleware>]>, handler: HandlerFn) -> Self {
        Self {
            middleware_stack,
            index: 0,
            final_handler: Some(Arc::new(handler)),
        }
    }

    /// Run the next middleware or final handler
    pub async fn run(self, req: Request<Body>) -> Result<Response<Body>> {
        if let Some(middleware) = self.middleware_stack.get(self.index) {
            let next = Self {
                middleware_stack: Arc::clone(&self.middleware_stack),
                index: self.index + 1,
                final_handler: self.final_handler.clone(),
            };
            middleware.call(req, next).await
        } else if let Some(handler) = self.final_handler {
            handler(req).await
        } else {
            Err(Error::Internal(
                "Middleware chain completed without handler".to_string(),
            ))
        }
    }
}

impl Clone for Next {
    fn clone(&self) -> Self {
        Self {
            middleware_stack: Arc::clone(&self.middleware_stack),
            index: self.index,
            final_handler: self.final_handler.clone(),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field(
                "remaining",
                &self.middleware_stack.len().saturating_sub(self.index),
            )
            .field("has_handler", &self.final_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderValue;

    #[derive(Debug)]
    struct TagMiddleware {
        tag: &'static str,
    }

    #[async_trait]
    impl Middleware for TagMiddleware {
        async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
            let mut response = next.run(req).await?;
            response
                .headers_mut()
                .append("x-trail", HeaderValue::from_static(self.tag));
            Ok(response)
        }
    }

    #[tokio::test]
    async fn test_chain_without_handler_errors() {
        let stack: Arc<[Arc<dyn Middleware>]> =
            Arc::new([Arc::new(TagMiddleware { tag: "first" }) as Arc<dyn Middleware>]);
        let next = Next::new(stack);

        let req = Request::builder()
            .uri("/test")
            .body(Body::from("test"))
            .unwrap();

        let result = next.run(req).await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let stack: Arc<[Arc<dyn Middleware>]> = Arc::new([
            Arc::new(TagMiddleware { tag: "outer" }) as Arc<dyn Middleware>,
            Arc::new(TagMiddleware { tag: "inner" }) as Arc<dyn Middleware>,
        ]);
        let next = Next::with_handler(
            stack,
            handler_fn(|_req| async { Ok(Response::new(Body::from("ok"))) }),
        );

        let req = Request::builder().uri("/").body(Body::default()).unwrap();
        let response = next.run(req).await.unwrap();

        // Inner middleware sees the response first
        let trail: Vec<_> = response
            .headers()
            .get_all("x-trail")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(trail, vec!["inner", "outer"]);
    }
}
