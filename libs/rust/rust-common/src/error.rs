//! Centralized error types for all Rust libraries.
//!
//! This module provides a unified error type shared by the verification
//! tooling crates, with built-in retryability classification.

use thiserror::Error;

/// Common error type for platform operations.
///
/// All errors are classified as either retryable or non-retryable,
/// which helps callers decide whether to retry failed operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// TLS material could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// Connection failures and timeouts are transient, e.g. a provider that
    /// is still starting up. Everything else is not.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_common::PlatformError;
    ///
    /// let err = PlatformError::tls("bad pem");
    /// assert!(!err.is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Tls(_) | Self::Internal(_) => false,
        }
    }

    /// Create a TLS configuration error with the given message.
    #[must_use]
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create an internal error with the given message.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_errors() {
        assert!(!PlatformError::tls("test").is_retryable());
        assert!(!PlatformError::internal("test").is_retryable());
    }

    #[tokio::test]
    async fn test_connect_failure_is_retryable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = reqwest::get(format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();
        assert!(PlatformError::from(err).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = PlatformError::tls("no certificates found");
        assert_eq!(err.to_string(), "TLS configuration error: no certificates found");

        let err = PlatformError::internal("tracing already initialized");
        assert_eq!(err.to_string(), "Internal error: tracing already initialized");
    }
}
