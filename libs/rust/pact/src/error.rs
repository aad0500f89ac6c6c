//! Verification error types using thiserror 2.0.
//!
//! Pre-flight failures (configuration, proxy start, readiness) abort a run
//! before the verification engine is invoked. Engine failures carry the
//! engine's own verdict.

use rust_common::PlatformError;
use std::time::Duration;
use thiserror::Error;

/// Readiness wait failures.
#[derive(Error, Debug)]
pub enum ReadinessError {
    /// Nothing accepted a connection before the timeout elapsed
    #[error("Expected server to start < {timeout:?}. {message}")]
    Timeout {
        /// How long the waiter polled
        timeout: Duration,
        /// Caller supplied diagnostic
        message: String,
    },
}

/// Reverse proxy start-up failures.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The listener could not be bound
    #[error("failed to bind verification proxy: {0}")]
    Bind(#[source] std::io::Error),

    /// The onward HTTP client could not be built
    #[error(transparent)]
    Client(#[from] PlatformError),
}

/// Verification engine failures.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine ran and reported a failed verification
    #[error("provider verification failed: {reason}")]
    Failed {
        /// Engine output describing the failure
        reason: String,
    },

    /// The engine process could not be started
    #[error("failed to launch verifier '{program}': {source}")]
    Launch {
        /// Program that was executed
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The request could not be translated for the engine
    #[error("invalid engine request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    /// Create a failed verification error.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Errors returned by a verification run.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The verification request is incomplete or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The provider base URL could not be parsed
    #[error("Invalid provider base URL '{url}': {reason}")]
    InvalidProviderUrl {
        /// URL as supplied
        url: String,
        /// Parse failure
        reason: String,
    },

    /// The verification proxy failed to start
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// The verification proxy never became reachable
    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    /// The verification engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for verification runs.
pub type VerificationResult<T> = Result<T, VerificationError>;

impl VerificationError {
    /// Check if the run was aborted before the engine was invoked.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        !matches!(self, Self::Engine(_))
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid provider URL error.
    #[must_use]
    pub fn invalid_provider_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProviderUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_timeout_display() {
        let err = ReadinessError::Timeout {
            timeout: Duration::from_secs(10),
            message: "Timed out waiting for http verification proxy on port 4000".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Expected server to start < 10s. Timed out waiting for http verification proxy on port 4000"
        );
    }

    #[test]
    fn test_preflight_classification() {
        assert!(VerificationError::invalid_config("no sources").is_preflight());
        assert!(VerificationError::invalid_provider_url("::", "relative URL").is_preflight());
        assert!(
            VerificationError::from(ReadinessError::Timeout {
                timeout: Duration::from_millis(50),
                message: String::new(),
            })
            .is_preflight()
        );
        assert!(!VerificationError::from(EngineError::failed("1 interaction failed")).is_preflight());
    }

    #[test]
    fn test_from_platform_error() {
        let proxy_err: ProxyError = PlatformError::tls("bad pem").into();
        let err: VerificationError = proxy_err.into();
        assert!(matches!(err, VerificationError::Proxy(ProxyError::Client(_))));
        assert_eq!(err.to_string(), "TLS configuration error: bad pem");
    }
}
