//! Webzip CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webzip_config::{load_config, LogFormat};
use webzip_runtime::{Server, SignalHandler};

#[derive(Parser)]
#[command(name = "webzip")]
#[command(about = "Web server with transparent page and resource compression", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "webzip.yaml", env = "WEBZIP_CONFIG")]
        config: PathBuf,

        /// Log level override (trace, debug, info, warn, error)
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "webzip.yaml", env = "WEBZIP_CONFIG")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, log_level } => {
            let path = config;
            let config = load_config(&path)?;

            let level = log_level.unwrap_or_else(|| config.logging.level.clone());
            init_tracing(&level, config.logging.format)?;

            tracing::info!(config = %path.display(), "Starting webzip");
            tracing::info!(
                listen = %config.server.listen,
                content_root = %config.content.root.display(),
                "Configuration loaded"
            );

            let server = Server::new(config);

            let shutdown_signal = server.shutdown_signal();
            tokio::spawn(async move {
                SignalHandler::new(shutdown_signal).run().await;
            });

            server.run().await?;
            Ok(())
        }

        Commands::Validate { config } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", config.display());

            match load_config(&config) {
                Ok(cfg) => {
                    tracing::info!("Configuration is valid");
                    tracing::info!("  Listen: {}", cfg.server.listen);
                    tracing::info!("  Content root: {}", cfg.content.root.display());
                    tracing::info!("  Resource endpoint: {}", cfg.compression.resource.endpoint);
                    tracing::info!("  Compression level: {}", cfg.compression.level);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("webzip {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env()
        .add_directive(filter.into())
        .add_directive("hyper=warn".parse()?);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    Ok(())
}
