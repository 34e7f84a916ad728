//! Configuration for compression middleware

use serde::{Deserialize, Serialize};

/// Compression configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionConfig {
    /// Enable compression
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Compression level (0-9)
    #[serde(default = "default_level")]
    pub level: u32,

    /// User-agent substrings of clients with broken compression support
    #[serde(default = "default_unsupported_user_agents")]
    pub unsupported_user_agents: Vec<String>,

    /// Whole-page compression
    #[serde(default)]
    pub page: PageCompressionConfig,

    /// Compressed static-resource endpoint
    #[serde(default)]
    pub resource: ResourceCompressionConfig,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            unsupported_user_agents: default_unsupported_user_agents(),
            page: PageCompressionConfig::default(),
            resource: ResourceCompressionConfig::default(),
        }
    }
}

/// Page compression configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageCompressionConfig {
    /// Enable page compression
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Request paths starting with any of these prefixes are never compressed
    #[serde(default = "default_excluded_path_prefixes")]
    pub excluded_path_prefixes: Vec<String>,

    /// Requests carrying this header (partial page updates) are never compressed
    #[serde(default = "default_bypass_header")]
    pub bypass_header: Option<String>,

    /// Response content types that identify a page
    #[serde(default = "default_page_content_types")]
    pub content_types: Vec<String>,
}

impl Default for PageCompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            excluded_path_prefixes: default_excluded_path_prefixes(),
            bypass_header: default_bypass_header(),
            content_types: default_page_content_types(),
        }
    }
}

/// Resource endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceCompressionConfig {
    /// Enable the compressed resource cache
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Requests whose path contains this name are served from the cache
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Content-Type sent with cached resources
    #[serde(default = "default_resource_content_type")]
    pub content_type: String,

    /// Days used for both the Expires and Last-Modified offsets
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

impl Default for ResourceCompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            content_type: default_resource_content_type(),
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> u32 {
    6
}

fn default_unsupported_user_agents() -> Vec<String> {
    vec!["MSIE 6".to_string()]
}

fn default_excluded_path_prefixes() -> Vec<String> {
    vec!["/umbraco".to_string()]
}

fn default_bypass_header() -> Option<String> {
    Some("X-MicrosoftAjax".to_string())
}

fn default_page_content_types() -> Vec<String> {
    vec!["text/html".to_string()]
}

fn default_endpoint() -> String {
    "WebResource.axd".to_string()
}

fn default_resource_content_type() -> String {
    "text/javascript".to_string()
}

fn default_max_age_days() -> u32 {
    30
}

impl CompressionConfig {
    /// Check if a response content type identifies a page
    pub fn is_page_content_type(&self, content_type: &str) -> bool {
        let ct = content_type.trim().to_ascii_lowercase();
        self.page
            .content_types
            .iter()
            .any(|prefix| ct.starts_with(&prefix.to_ascii_lowercase()))
    }

    /// Check if a request path is excluded from page compression
    pub fn is_excluded_path(&self, path: &str) -> bool {
        self.page
            .excluded_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Check if a request path targets the resource endpoint
    pub fn is_resource_path(&self, path: &str) -> bool {
        !self.resource.endpoint.is_empty() && path.contains(self.resource.endpoint.as_str())
    }
}
