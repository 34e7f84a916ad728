//! # Webzip Core
//!
//! Core types and traits shared by every webzip crate:
//! - Middleware trait and the `Next` chain
//! - Error types
//! - Body alias used across the request pipeline

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod middleware;

pub use error::{Error, Result};
pub use middleware::{handler_fn, Body, HandlerFn, HandlerFuture, Middleware, Next};
