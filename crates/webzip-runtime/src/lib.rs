//! # Webzip Runtime
//!
//! Hosts the compression middlewares in an HTTP server:
//! - Server lifecycle (startup, running, shutdown)
//! - Graceful shutdown with signal handling
//! - The request pipeline: middleware chain followed by the content handler

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod content;
pub mod handler;
pub mod server;
pub mod shutdown;

pub use content::ContentHandler;
pub use handler::RequestHandler;
pub use server::Server;
pub use shutdown::{ShutdownSignal, SignalHandler};

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Server is initializing
    Initializing,
    /// Server is running
    Running,
    /// Server is shutting down
    ShuttingDown,
    /// Server is stopped
    Stopped,
}
