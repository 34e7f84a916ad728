//! Configuration validation

use crate::Config;
use webzip_core::{Error, Result};

/// Highest compression level accepted by flate2
const MAX_LEVEL: u32 = 9;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_compression(config)?;
    validate_content(config)?;

    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    if config.server.shutdown_timeout.as_secs() > 300 {
        tracing::warn!("shutdown_timeout is very high (>5 minutes)");
    }

    Ok(())
}

fn validate_compression(config: &Config) -> Result<()> {
    let compression = &config.compression;

    if compression.level > MAX_LEVEL {
        return Err(Error::Config(format!(
            "compression level must be 0-{MAX_LEVEL}, got {}",
            compression.level
        )));
    }

    if compression.resource.enabled {
        if compression.resource.endpoint.is_empty() {
            return Err(Error::Config(
                "resource endpoint cannot be empty".to_string(),
            ));
        }
        if compression.resource.content_type.is_empty() {
            return Err(Error::Config(
                "resource content_type cannot be empty".to_string(),
            ));
        }
        if compression.resource.max_age_days == 0 {
            return Err(Error::Config("resource max_age_days must be > 0".to_string()));
        }
    }

    if compression.page.enabled && compression.page.content_types.is_empty() {
        tracing::warn!("Page compression is enabled but no page content types are configured");
    }

    if compression
        .unsupported_user_agents
        .iter()
        .any(|signature| signature.is_empty())
    {
        return Err(Error::Config(
            "unsupported_user_agents entries cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_content(config: &Config) -> Result<()> {
    if config.content.root.as_os_str().is_empty() {
        return Err(Error::Config("content root cannot be empty".to_string()));
    }

    if config.content.resource_param.is_empty() {
        return Err(Error::Config("content resource_param cannot be empty".to_string()));
    }

    if !config.content.root.is_dir() {
        tracing::warn!(
            root = %config.content.root.display(),
            "Content root does not exist or is not a directory"
        );
    }

    Ok(())
}
