//! Compressed static-resource endpoint
//!
//! Requests to the resource endpoint are answered from a [`ResourceCache`]
//! keyed by the request query string. The uncompressed resource is produced
//! by the rest of the pipeline: on a cache miss the middleware calls the
//! next handler directly and compresses what it returns.

use crate::cache::{CacheEntry, CacheKey, ResourceCache};
use crate::conditional::{etag_for, is_not_modified, CachingHeaders};
use crate::config::CompressionConfig;
use crate::encoding::{negotiate, set_content_encoding, ClientFilter};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tracing::{debug, warn};
use webzip_core::{Body, Error, Middleware, Next, Result};

/// Serves cached, compressed resources with ETag validation
#[derive(Debug, Clone)]
pub struct ResourceCompression {
    config: Arc<CompressionConfig>,
    cache: Arc<ResourceCache>,
    caching: CachingHeaders,
    clients: ClientFilter,
}

impl ResourceCompression {
    /// Create the middleware over a shared cache
    pub fn new(config: Arc<CompressionConfig>, cache: Arc<ResourceCache>) -> Self {
        let caching = CachingHeaders::new(config.resource.max_age_days);
        let clients = ClientFilter::new(config.unsupported_user_agents.clone());
        Self {
            config,
            cache,
            caching,
            clients,
        }
    }

    /// The cache backing this endpoint
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    fn cached_response(&self, entry: &CacheEntry, etag: &str) -> Result<Response<Body>> {
        let content_type =
            HeaderValue::from_str(&self.config.resource.content_type).map_err(http::Error::from)?;

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, entry.bytes().len())
            .body(Body::new(entry.bytes().clone()))?;

        set_content_encoding(response.headers_mut(), entry.encoding());
        self.caching
            .apply(response.headers_mut(), etag, Utc::now())?;
        Ok(response)
    }
}

#[async_trait]
impl Middleware for ResourceCompression {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        if !self.config.enabled
            || !self.config.resource.enabled
            || !self.config.is_resource_path(req.uri().path())
        {
            return next.run(req).await;
        }

        let key = CacheKey::from_uri(req.uri());
        let etag = etag_for(key.as_str());

        if is_not_modified(req.headers(), &etag) {
            debug!(key = %key, "Resource not modified");
            let mut response = Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .body(Body::default())?;
            self.caching
                .apply(response.headers_mut(), &etag, Utc::now())?;
            return Ok(response);
        }

        let encoding = if self.clients.is_supported_request(req.headers()) {
            negotiate(req.headers())
        } else {
            debug!(key = %key, "Client has known compression defects");
            None
        };

        let Some(encoding) = encoding else {
            let mut response = next.run(req).await?;
            self.caching
                .apply(response.headers_mut(), &etag, Utc::now())?;
            return Ok(response);
        };

        let entry = self
            .cache
            .get_or_compute(&key, encoding, || fetch_resource(next, req))
            .await?;

        if entry.encoding() != encoding {
            debug!(
                key = %key,
                requested = %encoding,
                cached = %entry.encoding(),
                "Serving resource with the encoding it was cached under"
            );
        }

        self.cached_response(&entry, &etag)
    }
}

/// Produce the uncompressed resource by running the rest of the pipeline
async fn fetch_resource(next: Next, req: Request<Body>) -> Result<Bytes> {
    let key = CacheKey::from_uri(req.uri());

    let response = next
        .run(req)
        .await
        .map_err(|e| Error::upstream_fetch(key.as_str(), e.to_string()))?;

    if !response.status().is_success() {
        warn!(key = %key, status = %response.status(), "Resource fetch failed");
        return Err(Error::upstream_fetch(
            key.as_str(),
            format!("handler returned status {}", response.status()),
        ));
    }

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read body: {e}")))?
        .to_bytes();

    Ok(body)
}
