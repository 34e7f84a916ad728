//! HTTP server implementation

use crate::content::ContentHandler;
use crate::handler::RequestHandler;
use crate::shutdown::ShutdownSignal;
use crate::RuntimeState;
use bytes::Bytes;
use http_body_util::Full;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use webzip_compression::{PageCompression, ResourceCache, ResourceCompression};
use webzip_config::Config;
use webzip_core::{Error, Middleware, Result};

/// HTTP server
pub struct Server {
    config: Config,
    cache: Arc<ResourceCache>,
    handler: RequestHandler,
    state: Arc<RwLock<RuntimeState>>,
    shutdown: ShutdownSignal,
    active_requests: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen", &self.config.server.listen)
            .field("cache", &self.cache)
            .field("active_requests", &self.active_requests)
            .finish()
    }
}

impl Server {
    /// Build the server and its request pipeline from configuration.
    ///
    /// The resource cache is created here and lives as long as the server.
    pub fn new(config: Config) -> Self {
        let compression = Arc::new(config.compression.clone());
        let cache = Arc::new(ResourceCache::new(compression.level));

        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(PageCompression::new(Arc::clone(&compression))),
            Arc::new(ResourceCompression::new(
                Arc::clone(&compression),
                Arc::clone(&cache),
            )),
        ];

        tracing::info!(
            level = compression.level,
            page = compression.enabled && compression.page.enabled,
            resource = compression.enabled && compression.resource.enabled,
            endpoint = %compression.resource.endpoint,
            "Compression middleware configured"
        );

        let content = Arc::new(ContentHandler::new(
            config.content.clone(),
            compression.resource.endpoint.clone(),
        ));
        let active_requests = Arc::new(AtomicUsize::new(0));
        let handler = RequestHandler::new(
            Arc::from(middlewares),
            content,
            Arc::clone(&active_requests),
        );

        Self {
            config,
            cache,
            handler,
            state: Arc::new(RwLock::new(RuntimeState::Initializing)),
            shutdown: ShutdownSignal::new(),
            active_requests,
        }
    }

    /// Get the current state
    pub async fn state(&self) -> RuntimeState {
        *self.state.read().await
    }

    /// Configured listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.server.listen
    }

    /// The shared resource cache
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// The request pipeline
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Get shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr()).await.map_err(|e| {
            Error::Runtime(format!("Failed to bind to {}: {}", self.listen_addr(), e))
        })?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        *self.state.write().await = RuntimeState::Running;

        tracing::info!(listen = %listener.local_addr()?, "Server listening");

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::trace!("Accepted connection from {}", addr);
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                let service = hyper::service::service_fn(move |req| {
                                    let handler = handler.clone();
                                    async move {
                                        handler.handle(req).await.or_else(|e| {
                                            tracing::error!("Request handler error: {}", e);
                                            http::Response::builder()
                                                .status(e.to_status_code())
                                                .body(Full::new(Bytes::from(format!("Error: {e}"))))
                                        })
                                    }
                                });

                                let io = hyper_util::rt::TokioIo::new(stream);
                                if let Err(e) = hyper::server::conn::http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    tracing::error!("HTTP connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        *self.state.write().await = RuntimeState::ShuttingDown;
        self.drain().await;
        *self.state.write().await = RuntimeState::Stopped;

        tracing::info!(cached_resources = self.cache.len(), "Server stopped");
        Ok(())
    }

    /// Wait for in-flight requests, bounded by the shutdown timeout
    async fn drain(&self) {
        let shutdown_timeout = self.config.server.shutdown_timeout;
        let start = std::time::Instant::now();

        loop {
            let active = self.active_requests.load(Ordering::Relaxed);

            if active == 0 {
                tracing::info!("All requests completed, shutting down cleanly");
                break;
            }

            if start.elapsed() >= shutdown_timeout {
                tracing::warn!(
                    active_requests = active,
                    "Shutdown timeout reached, forcing shutdown"
                );
                break;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
