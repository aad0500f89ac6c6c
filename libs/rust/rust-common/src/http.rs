//! Centralized HTTP client configuration and building.
//!
//! This module provides a standardized way to create HTTP clients with
//! consistent configuration, including the custom TLS trust settings used
//! when forwarding verification traffic to a provider over HTTPS.

use reqwest::{Certificate, Client, ClientBuilder, redirect};
use std::time::Duration;

use crate::PlatformError;

/// Custom TLS settings for outbound connections.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Additional PEM-encoded root certificates to trust
    pub root_certificates_pem: Vec<Vec<u8>>,
    /// Skip certificate and hostname verification
    pub accept_invalid_certs: bool,
}

impl TlsConfig {
    /// Trust an additional PEM-encoded root certificate.
    #[must_use]
    pub fn with_root_certificate_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_certificates_pem.push(pem.into());
        self
    }

    /// Disable certificate verification (self-signed test providers).
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// HTTP client configuration.
///
/// Provides sensible defaults with connection pooling, timeouts, and
/// optional TLS customisation.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// Whether redirects are followed (default: true)
    pub follow_redirects: bool,
    /// User agent string
    pub user_agent: String,
    /// Custom TLS settings
    pub tls: Option<TlsConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            follow_redirects: true,
            user_agent: "pact-provider-proxy/1.0".to_string(),
            tls: None,
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP config with custom timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a new HTTP config with custom connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create a new HTTP config with custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Pass redirect responses back to the caller instead of following them.
    #[must_use]
    pub const fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Apply custom TLS settings.
    #[must_use]
    pub fn with_tls(mut self, tls: Option<TlsConfig>) -> Self {
        self.tls = tls;
        self
    }
}

/// Build a configured HTTP client.
///
/// Creates a reqwest client with rustls TLS, connection pooling, and
/// the specified configuration.
///
/// # Errors
///
/// Returns [`PlatformError::Tls`] if a configured root certificate is not
/// valid PEM, or [`PlatformError::Http`] if the client cannot be built.
///
/// # Examples
///
/// ```
/// use rust_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default()
///     .with_timeout(Duration::from_secs(60));
/// let client = build_http_client(&config).expect("Failed to build client");
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, PlatformError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    if !config.follow_redirects {
        builder = builder.redirect(redirect::Policy::none());
    }

    if let Some(tls) = &config.tls {
        for pem in &tls.root_certificates_pem {
            let certificate =
                Certificate::from_pem(pem).map_err(|e| PlatformError::tls(e.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }
        builder = builder.danger_accept_invalid_certs(tls.accept_invalid_certs);
    }

    Ok(builder.build()?)
}
