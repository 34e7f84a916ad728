//! Whole-page compression middleware

use crate::compressor::Compressor;
use crate::config::CompressionConfig;
use crate::encoding::{negotiate, set_content_encoding, ContentEncoding};
use async_trait::async_trait;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tracing::{debug, trace};
use webzip_core::{Body, Error, Middleware, Next, Result};

/// Compresses page responses with the negotiated encoding
#[derive(Debug, Clone)]
pub struct PageCompression {
    config: Arc<CompressionConfig>,
}

impl PageCompression {
    /// Create a new page compression middleware
    pub fn new(config: Arc<CompressionConfig>) -> Self {
        Self { config }
    }

    /// Check whether the request is eligible before running the handler
    fn is_eligible_request(&self, req: &Request<Body>) -> bool {
        if self.config.is_excluded_path(req.uri().path()) {
            return false;
        }

        if let Some(ref bypass) = self.config.page.bypass_header {
            if req.headers().contains_key(bypass.as_str()) {
                return false;
            }
        }

        true
    }

    /// Check whether the handler produced a page
    fn is_page(&self, response: &Response<Body>) -> bool {
        if response.headers().contains_key(CONTENT_ENCODING) {
            return false;
        }

        if matches!(
            response.status(),
            StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED
        ) {
            return false;
        }

        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|ct| self.config.is_page_content_type(ct))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Middleware for PageCompression {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        if !self.config.enabled || !self.config.page.enabled {
            return next.run(req).await;
        }

        if !self.is_eligible_request(&req) {
            trace!(path = %req.uri().path(), "Page compression skipped for request");
            return next.run(req).await;
        }

        let Some(encoding) = negotiate(req.headers()) else {
            return next.run(req).await;
        };

        let response = next.run(req).await?;

        if !self.is_page(&response) {
            return Ok(response);
        }

        compress_response(response, encoding, self.config.level).await
    }
}

/// Replace the response body with its compressed form
async fn compress_response(
    response: Response<Body>,
    encoding: ContentEncoding,
    level: u32,
) -> Result<Response<Body>> {
    let (mut parts, body) = response.into_parts();

    let body_bytes = body
        .collect()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read body: {e}")))?
        .to_bytes();

    let compressed = Compressor::compress(&body_bytes, encoding, level)?;

    debug!(
        encoding = %encoding,
        original_size = body_bytes.len(),
        compressed_size = compressed.len(),
        "Page compressed"
    );

    set_content_encoding(&mut parts.headers, encoding);
    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(compressed.len()));
    parts.headers.remove(TRANSFER_ENCODING);

    Ok(Response::from_parts(parts, Body::new(compressed)))
}
