//! HTTP verification proxy.
//!
//! Listens on an OS-assigned loopback port, runs every request through the
//! middleware pipeline and forwards what falls through to the provider.

use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Request, Response, StatusCode, Uri};
use reqwest::Client;
use rust_common::{HttpConfig, PlatformError, TlsConfig, build_http_client};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ProxyError, VerificationError};
use crate::pipeline::{HttpHandler, Middleware, compose, handler_fn, status_response};

/// Connection-scoped headers, never copied between client and provider.
const STRIPPED_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Where the provider under test is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTarget {
    /// `http` or `https`
    pub scheme: String,
    /// Host name or IP literal
    pub host: String,
    /// Port, defaulted from the scheme when absent
    pub port: u16,
    /// Base path requests are mounted under
    pub path: String,
}

impl ProviderTarget {
    /// Parse a provider base URL.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::InvalidProviderUrl`] when the URL does not
    /// parse or lacks a host or port.
    pub fn parse(base_url: &str) -> Result<Self, VerificationError> {
        let url = Url::parse(base_url)
            .map_err(|e| VerificationError::invalid_provider_url(base_url, e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(VerificationError::invalid_provider_url(
                base_url,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let host = url
            .host_str()
            .ok_or_else(|| VerificationError::invalid_provider_url(base_url, "missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| VerificationError::invalid_provider_url(base_url, "missing port"))?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port,
            path: url.path().to_string(),
        })
    }

    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Provider URL for an incoming request URI.
    #[must_use]
    pub fn url_for(&self, uri: &Uri) -> String {
        let path = join_paths(&self.path, uri.path());
        match uri.query() {
            Some(query) => format!("{}://{}{path}?{query}", self.scheme, self.address()),
            None => format!("{}://{}{path}", self.scheme, self.address()),
        }
    }
}

/// Join two URL paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Verification proxy options.
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// Provider requests are forwarded to
    pub target: ProviderTarget,
    /// Pipeline, outermost first
    pub middleware: Vec<Middleware>,
    /// Path prefix handled by the proxy itself, never forwarded
    pub internal_request_path_prefix: String,
    /// TLS settings for the onward connection
    pub custom_tls_config: Option<TlsConfig>,
}

impl ProxyOptions {
    /// Create options forwarding to `target`.
    #[must_use]
    pub fn new(target: ProviderTarget) -> Self {
        Self {
            target,
            middleware: Vec::new(),
            internal_request_path_prefix: crate::state::PROVIDER_STATES_SETUP_PATH.to_string(),
            custom_tls_config: None,
        }
    }

    /// Set the middleware pipeline.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Vec<Middleware>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Set the internal path prefix.
    #[must_use]
    pub fn with_internal_request_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.internal_request_path_prefix = prefix.into();
        self
    }

    /// Set custom TLS settings.
    #[must_use]
    pub fn with_custom_tls_config(mut self, tls: Option<TlsConfig>) -> Self {
        self.custom_tls_config = tls;
        self
    }
}

/// A running proxy listener.
///
/// The listener is stopped on [`ProxyBinding::shutdown`] or when dropped.
#[derive(Debug)]
pub struct ProxyBinding {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ProxyBinding {
    /// Port the proxy listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `http://localhost:{port}`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "verification proxy task failed");
        }
        debug!(port = self.port, "verification proxy stopped");
    }
}

impl Drop for ProxyBinding {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start the verification proxy.
///
/// # Errors
///
/// Returns [`ProxyError`] when the onward client cannot be built or the
/// listener cannot be bound.
pub async fn http_reverse_proxy(options: ProxyOptions) -> Result<ProxyBinding, ProxyError> {
    let client = build_http_client(
        &HttpConfig::default()
            .without_redirects()
            .with_tls(options.custom_tls_config.clone()),
    )?;

    let pass_through = PassThrough {
        client,
        target: options.target.clone(),
        internal_prefix: options.internal_request_path_prefix.clone(),
    };
    let handler = compose(&options.middleware, pass_through.into_handler());

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(ProxyError::Bind)?;
    let port = listener.local_addr().map_err(ProxyError::Bind)?.port();

    let app = Router::new().fallback_service(handler);
    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = rx.await;
        });
        if let Err(e) = server.await {
            error!(error = %e, "verification proxy server error");
        }
    });

    info!(
        port,
        target = %options.target.address(),
        scheme = %options.target.scheme,
        "verification proxy listening"
    );

    Ok(ProxyBinding {
        port,
        shutdown: Some(tx),
        task,
    })
}

/// Innermost handler: forwards to the provider.
#[derive(Debug, Clone)]
struct PassThrough {
    client: Client,
    target: ProviderTarget,
    internal_prefix: String,
}

impl PassThrough {
    fn into_handler(self) -> HttpHandler {
        let this = Arc::new(self);
        handler_fn(move |req| Arc::clone(&this).forward(req))
    }

    async fn forward(self: Arc<Self>, req: Request<Body>) -> Response<Body> {
        if req.uri().path().starts_with(&self.internal_prefix) {
            debug!(path = %req.uri().path(), "internal request not forwarded");
            return status_response(StatusCode::OK);
        }

        let url = self.target.url_for(req.uri());
        let (parts, body) = req.into_parts();

        let body = match to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "unable to read request body");
                return status_response(StatusCode::BAD_REQUEST);
            }
        };

        let mut headers = parts.headers;
        strip_connection_headers(&mut headers);

        debug!(method = %parts.method, %url, "forwarding request to provider");
        let upstream = match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                let e = PlatformError::from(e);
                error!(%url, error = %e, retryable = e.is_retryable(), "provider request failed");
                return status_response(StatusCode::BAD_GATEWAY);
            }
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_connection_headers(&mut headers);

        match upstream.bytes().await {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(e) => {
                error!(%url, error = %e, "unable to read provider response");
                status_response(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

fn strip_connection_headers(headers: &mut HeaderMap) {
    for name in &STRIPPED_HEADERS {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}
