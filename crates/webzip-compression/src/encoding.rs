//! Accept-Encoding negotiation
//!
//! Negotiation is a plain substring test against the raw `Accept-Encoding`
//! value, not a parsed token list. `"gzip;q=0"` therefore still counts as
//! accepting gzip, and a token such as `"x-deflate-ish"` counts as deflate.

use http::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Content codings this crate can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    /// zlib-wrapped deflate
    Deflate,
    /// gzip
    Gzip,
}

impl ContentEncoding {
    /// Encodings in negotiation order
    pub const PRIORITY: [ContentEncoding; 2] = [ContentEncoding::Deflate, ContentEncoding::Gzip];

    /// Get the Content-Encoding header value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deflate => "deflate",
            Self::Gzip => "gzip",
        }
    }

    /// Header value for this encoding
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodings advertised by a request
#[derive(Debug, Clone, Default)]
pub struct AcceptedEncodings<'a> {
    raw: Option<Cow<'a, str>>,
}

impl<'a> AcceptedEncodings<'a> {
    /// Read the `Accept-Encoding` header.
    ///
    /// Repeated field lines are joined with `", "`. Lines that are not UTF-8
    /// are skipped, and a request with no usable line accepts nothing.
    pub fn from_headers(headers: &'a HeaderMap) -> Self {
        let mut lines = headers
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|value| value.to_str().ok());

        let raw = match (lines.next(), lines.next()) {
            (None, _) => None,
            (Some(only), None) => Some(Cow::Borrowed(only)),
            (Some(first), Some(second)) => {
                let mut joined = format!("{first}, {second}");
                for line in lines {
                    joined.push_str(", ");
                    joined.push_str(line);
                }
                Some(Cow::Owned(joined))
            }
        };

        Self { raw }
    }

    /// Wrap a raw header value
    pub fn from_raw(raw: Option<&'a str>) -> Self {
        Self {
            raw: raw.map(Cow::Borrowed),
        }
    }

    /// Check whether the client accepts the given encoding
    pub fn accepts(&self, encoding: ContentEncoding) -> bool {
        self.raw
            .as_deref()
            .map(|raw| raw.contains(encoding.as_str()))
            .unwrap_or(false)
    }

    /// Pick an encoding: deflate first, then gzip
    pub fn negotiate(&self) -> Option<ContentEncoding> {
        ContentEncoding::PRIORITY
            .into_iter()
            .find(|encoding| self.accepts(*encoding))
    }
}

/// Negotiate a response encoding from request headers
pub fn negotiate(headers: &HeaderMap) -> Option<ContentEncoding> {
    AcceptedEncodings::from_headers(headers).negotiate()
}

/// Record the applied encoding on a response.
///
/// Replaces any existing value so the header is present exactly once.
pub fn set_content_encoding(headers: &mut HeaderMap, encoding: ContentEncoding) {
    headers.insert(CONTENT_ENCODING, encoding.header_value());
}

/// Detects clients with known compression defects
#[derive(Debug, Clone)]
pub struct ClientFilter {
    signatures: Vec<String>,
}

impl ClientFilter {
    /// Create a filter rejecting user agents containing any of `signatures`
    pub fn new(signatures: Vec<String>) -> Self {
        Self { signatures }
    }

    /// Check whether compressed content may be sent to this user agent
    pub fn is_supported(&self, user_agent: Option<&str>) -> bool {
        self.is_supported_bytes(user_agent.map(str::as_bytes))
    }

    /// Check a raw user agent value, which may carry non-UTF-8 obs-text
    pub fn is_supported_bytes(&self, user_agent: Option<&[u8]>) -> bool {
        match user_agent {
            Some(agent) => !self
                .signatures
                .iter()
                .any(|signature| contains_bytes(agent, signature.as_bytes())),
            None => true,
        }
    }

    /// Check the `User-Agent` header of a request
    pub fn is_supported_request(&self, headers: &HeaderMap) -> bool {
        self.is_supported_bytes(headers.get(USER_AGENT).map(HeaderValue::as_bytes))
    }
}

impl Default for ClientFilter {
    fn default() -> Self {
        Self::new(vec!["MSIE 6".to_string()])
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty()
        || haystack
            .windows(needle.len())
            .any(|window| window == needle)
}

/// Check a user agent against the default defect list (Internet Explorer 6)
pub fn is_client_supported(user_agent: Option<&str>) -> bool {
    ClientFilter::default().is_supported(user_agent)
}
