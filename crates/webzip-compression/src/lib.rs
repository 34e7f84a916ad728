//! Compression middleware for webzip
//!
//! Provides transparent response compression with support for:
//! - deflate (preferred when the client accepts it)
//! - gzip
//!
//! Features:
//! - Accept-Encoding negotiation with a fixed deflate-then-gzip priority
//! - Whole-page compression for HTML responses
//! - A process-wide cache of compressed static resources keyed by query string
//! - ETag based conditional requests for cached resources

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod cache;
pub mod compressor;
pub mod conditional;
pub mod config;
pub mod encoding;
pub mod page;
pub mod resource;

pub use cache::{CacheEntry, CacheKey, ResourceCache};
pub use compressor::Compressor;
pub use conditional::{etag_for, is_not_modified, CachingHeaders};
pub use config::{CompressionConfig, PageCompressionConfig, ResourceCompressionConfig};
pub use encoding::{
    is_client_supported, negotiate, set_content_encoding, AcceptedEncodings, ClientFilter,
    ContentEncoding,
};
pub use page::PageCompression;
pub use resource::ResourceCompression;
