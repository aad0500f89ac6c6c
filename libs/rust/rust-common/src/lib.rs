//! Shared library for cross-cutting concerns in contract verification tooling.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - HTTP client configuration and building, including custom TLS trust
//! - Tracing subscriber initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, TlsConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
