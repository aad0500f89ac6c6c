//! HTTP provider verifier.
//!
//! Orchestrates one verification run: start the proxy in front of the
//! provider, wait until it accepts connections, hand the engine a request
//! pointing at the proxy, then tear the proxy down.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::engine::VerificationEngine;
use crate::error::{VerificationError, VerificationResult};
use crate::pipeline::build_middleware;
use crate::proxy::{ProviderTarget, ProxyOptions, http_reverse_proxy};
use crate::readiness::{Network, ReadinessWaiter, TcpReadinessWaiter};
use crate::request::{EngineRequest, VerificationRequest};
use crate::state::PROVIDER_STATES_SETUP_PATH;

/// Readiness timeout used when none is configured.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs provider verifications through the verification proxy.
#[derive(Clone)]
pub struct HttpVerifier {
    client_timeout: Option<Duration>,
    engine: Arc<dyn VerificationEngine>,
    waiter: Arc<dyn ReadinessWaiter>,
}

impl std::fmt::Debug for HttpVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVerifier")
            .field("client_timeout", &self.client_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpVerifier {
    /// Create a verifier driving `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn VerificationEngine>) -> Self {
        Self {
            client_timeout: None,
            engine,
            waiter: Arc::new(TcpReadinessWaiter),
        }
    }

    /// Set how long to wait for the proxy to accept connections.
    #[must_use]
    pub const fn with_client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = Some(timeout);
        self
    }

    /// Replace the readiness waiter.
    #[must_use]
    pub fn with_readiness_waiter(mut self, waiter: Arc<dyn ReadinessWaiter>) -> Self {
        self.waiter = waiter;
        self
    }

    /// Fill in defaults for unset options.
    pub fn validate_config(&mut self) {
        if self.client_timeout.is_none() {
            self.client_timeout = Some(DEFAULT_CLIENT_TIMEOUT);
        }
    }

    /// Effective readiness timeout.
    #[must_use]
    pub fn client_timeout(&self) -> Duration {
        self.client_timeout.unwrap_or(DEFAULT_CLIENT_TIMEOUT)
    }

    /// Run a verification and report the outcome.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_provider_raw`].
    pub async fn verify_provider(&mut self, request: &VerificationRequest) -> VerificationResult<()> {
        match self.verify_provider_raw(request).await {
            Ok(()) => {
                info!(provider = %request.provider, "provider verification passed");
                Ok(())
            }
            Err(e) => {
                error!(provider = %request.provider, error = %e, "provider verification failed");
                Err(e)
            }
        }
    }

    /// Run a verification.
    ///
    /// # Errors
    ///
    /// Returns a pre-flight [`VerificationError`] if the request is invalid,
    /// the proxy fails to start or never becomes reachable; the engine is not
    /// invoked in those cases. Otherwise returns the engine's verdict.
    pub async fn verify_provider_raw(&mut self, request: &VerificationRequest) -> VerificationResult<()> {
        self.validate_config();
        request.validate()?;

        let target = ProviderTarget::parse(&request.provider_base_url)?;
        let options = ProxyOptions::new(target)
            .with_middleware(build_middleware(request))
            .with_internal_request_path_prefix(PROVIDER_STATES_SETUP_PATH)
            .with_custom_tls_config(request.custom_tls_config.clone());

        let binding = http_reverse_proxy(options).await?;
        let port = binding.port();

        let setup_url = provider_states_setup_url(
            &request.provider_states_setup_url,
            !request.state_handlers.is_empty(),
            port,
        );
        let engine_request =
            EngineRequest::from_verification_request(request, binding.base_url(), setup_url);

        let timeout = self.client_timeout();
        let message =
            format!("Timed out waiting for http verification proxy on port {port} - check for errors");
        if let Err(e) = self
            .waiter
            .wait(port, Network::Tcp, "localhost", timeout, &message)
            .await
        {
            binding.shutdown().await;
            return Err(VerificationError::from(e));
        }

        debug!(
            provider = %engine_request.provider,
            base_url = %engine_request.provider_base_url,
            states_setup_url = %engine_request.provider_states_setup_url,
            "running verification engine"
        );

        let verdict = self.engine.verify(&engine_request).await;
        binding.shutdown().await;

        verdict.map_err(VerificationError::from)
    }
}

/// State setup URL handed to the engine.
///
/// A configured legacy URL wins. Otherwise the proxy's own setup path is
/// used when state handlers are registered, and none at all when not.
#[must_use]
pub fn provider_states_setup_url(configured: &str, has_state_handlers: bool, port: u16) -> String {
    if configured.is_empty() && has_state_handlers {
        format!("http://localhost:{port}{PROVIDER_STATES_SETUP_PATH}")
    } else {
        configured.to_string()
    }
}
