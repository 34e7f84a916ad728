//! HTTP request handler

use crate::content::ContentHandler;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use webzip_core::{handler_fn, Body, Error, Middleware, Next, Result};

/// Runs each request through the middleware chain and into the content handler
#[derive(Clone)]
pub struct RequestHandler {
    middleware_chain: Arc<[Arc<dyn Middleware>]>,
    content: Arc<ContentHandler>,
    active_requests: Arc<AtomicUsize>,
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("middleware_count", &self.middleware_chain.len())
            .field("active_requests", &self.active_requests)
            .finish()
    }
}

/// Decrements the in-flight counter when a request finishes
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(
        middleware_chain: Arc<[Arc<dyn Middleware>]>,
        content: Arc<ContentHandler>,
        active_requests: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            middleware_chain,
            content,
            active_requests,
        }
    }

    /// Handle an incoming HTTP request (from Hyper with Incoming body)
    pub async fn handle(&self, req: Request<Incoming>) -> Result<Response<Body>> {
        let (parts, body) = req.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read request body: {e}")))?
            .to_bytes();

        self.dispatch(Request::from_parts(parts, Full::new(body_bytes)))
            .await
    }

    /// Run a buffered request through the pipeline
    pub async fn dispatch(&self, req: Request<Body>) -> Result<Response<Body>> {
        let _guard = ActiveGuard::enter(&self.active_requests);
        let start = Instant::now();
        let method = req.method().clone();
        let uri = req.uri().clone();

        let content = Arc::clone(&self.content);
        let final_handler = handler_fn(move |req: Request<Body>| {
            let content = Arc::clone(&content);
            async move { content.handle(req).await }
        });

        let next = Next::with_handler(Arc::clone(&self.middleware_chain), final_handler);
        let response = next.run(req).await?;

        debug!(
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        Ok(response)
    }

    /// Number of requests currently being processed
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }
}
