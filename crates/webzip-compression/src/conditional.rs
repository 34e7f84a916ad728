//! ETag validation and caching headers for resource responses

use chrono::{DateTime, Duration, Utc};
use http::header::{
    HeaderMap, HeaderValue, CACHE_CONTROL, ETAG, EXPIRES, IF_NONE_MATCH, LAST_MODIFIED, VARY,
};
use sha2::{Digest, Sha256};
use std::time::SystemTime;
use webzip_core::Result;

/// Bytes of the SHA-256 digest kept in an ETag
const ETAG_DIGEST_LEN: usize = 16;

/// Compute the ETag for a resource query string.
///
/// The tag depends on the query string only, not on the resource bytes, and
/// is identical across processes.
pub fn etag_for(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    format!("\"{}\"", hex::encode(&digest[..ETAG_DIGEST_LEN]))
}

/// Check `If-None-Match` against `etag` by exact byte comparison
pub fn is_not_modified(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(IF_NONE_MATCH)
        .map(|value| value.as_bytes() == etag.as_bytes())
        .unwrap_or(false)
}

/// Caching headers attached to every resource response
#[derive(Debug, Clone, Copy)]
pub struct CachingHeaders {
    max_age: Duration,
}

impl CachingHeaders {
    /// Create headers with `Expires` and `Last-Modified` offset by `max_age_days`
    pub fn new(max_age_days: u32) -> Self {
        Self {
            max_age: Duration::days(i64::from(max_age_days)),
        }
    }

    /// Set `Cache-Control`, `Vary`, `Expires`, `Last-Modified` and `ETag`.
    ///
    /// `Last-Modified` is `now - max_age`, a fixed placeholder rather than
    /// the resource's real modification time.
    pub fn apply(&self, headers: &mut HeaderMap, etag: &str, now: DateTime<Utc>) -> Result<()> {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public"));
        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
        headers.insert(EXPIRES, http_date(now + self.max_age)?);
        headers.insert(LAST_MODIFIED, http_date(now - self.max_age)?);
        headers.insert(
            ETAG,
            HeaderValue::from_str(etag).map_err(http::Error::from)?,
        );
        Ok(())
    }
}

impl Default for CachingHeaders {
    fn default() -> Self {
        Self::new(30)
    }
}

fn http_date(at: DateTime<Utc>) -> Result<HeaderValue> {
    let formatted = httpdate::fmt_http_date(SystemTime::from(at));
    Ok(HeaderValue::from_str(&formatted).map_err(http::Error::from)?)
}
