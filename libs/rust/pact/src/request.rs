//! Verification request types.
//!
//! [`VerificationRequest`] is the caller's input for one run. The verifier
//! derives an [`EngineRequest`] from it, pointing the engine at the proxy.

use std::path::PathBuf;

use rust_common::TlsConfig;
use secrecy::SecretString;

use crate::error::VerificationError;
use crate::hooks::Hook;
use crate::pipeline::Middleware;
use crate::state::{StateHandler, StateHandlers};

/// Where contracts are loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractSources {
    /// Contract URLs
    pub pact_urls: Vec<String>,
    /// Local contract files
    pub pact_files: Vec<PathBuf>,
    /// Directories of contract files
    pub pact_dirs: Vec<PathBuf>,
}

impl ContractSources {
    /// Check if no local or URL source is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pact_urls.is_empty() && self.pact_files.is_empty() && self.pact_dirs.is_empty()
    }
}

/// Pact Broker connection settings.
#[derive(Debug, Clone, Default)]
pub struct BrokerOptions {
    /// Broker base URL
    pub url: Option<String>,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<SecretString>,
    /// Bearer token
    pub token: Option<SecretString>,
    /// Consumer version tags to verify
    pub consumer_tags: Vec<String>,
}

/// Result publishing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Publish results back to the broker
    pub publish_verification_results: bool,
    /// Provider version to publish under
    pub provider_version: Option<String>,
    /// Tags applied to the provider version
    pub provider_tags: Vec<String>,
}

/// Input for one verification run.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    /// Provider name
    pub provider: String,
    /// Where the real provider listens
    pub provider_base_url: String,
    /// Legacy external state setup URL; empty when unused
    pub provider_states_setup_url: String,
    /// Contract locations
    pub sources: ContractSources,
    /// Broker settings
    pub broker: BrokerOptions,
    /// Publishing settings
    pub publish: PublishOptions,
    /// Fail when no contracts are found
    pub fail_if_no_pacts_found: bool,
    /// Runs on each state setup request
    pub before_each: Option<Hook>,
    /// Runs after each interaction
    pub after_each: Option<Hook>,
    /// Provider state handlers by name
    pub state_handlers: StateHandlers,
    /// Caller supplied middleware, innermost before the provider
    pub request_filter: Option<Middleware>,
    /// TLS settings for connecting to the provider
    pub custom_tls_config: Option<TlsConfig>,
}

impl VerificationRequest {
    /// Create a request for `provider` listening at `provider_base_url`.
    #[must_use]
    pub fn new(provider: impl Into<String>, provider_base_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_base_url: provider_base_url.into(),
            ..Default::default()
        }
    }

    /// Add a local contract file.
    #[must_use]
    pub fn with_pact_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.sources.pact_files.push(file.into());
        self
    }

    /// Add a directory of contract files.
    #[must_use]
    pub fn with_pact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sources.pact_dirs.push(dir.into());
        self
    }

    /// Add a contract URL.
    #[must_use]
    pub fn with_pact_url(mut self, url: impl Into<String>) -> Self {
        self.sources.pact_urls.push(url.into());
        self
    }

    /// Set broker settings.
    #[must_use]
    pub fn with_broker(mut self, broker: BrokerOptions) -> Self {
        self.broker = broker;
        self
    }

    /// Set publishing settings.
    #[must_use]
    pub fn with_publish(mut self, publish: PublishOptions) -> Self {
        self.publish = publish;
        self
    }

    /// Use a legacy external state setup URL.
    #[must_use]
    pub fn with_provider_states_setup_url(mut self, url: impl Into<String>) -> Self {
        self.provider_states_setup_url = url.into();
        self
    }

    /// Fail when no contracts are found.
    #[must_use]
    pub const fn with_fail_if_no_pacts_found(mut self, fail: bool) -> Self {
        self.fail_if_no_pacts_found = fail;
        self
    }

    /// Set the before hook.
    #[must_use]
    pub fn with_before_each(mut self, hook: Hook) -> Self {
        self.before_each = Some(hook);
        self
    }

    /// Set the after hook.
    #[must_use]
    pub fn with_after_each(mut self, hook: Hook) -> Self {
        self.after_each = Some(hook);
        self
    }

    /// Register a state handler.
    #[must_use]
    pub fn with_state_handler(mut self, state: impl Into<String>, handler: StateHandler) -> Self {
        self.state_handlers.insert(state.into(), handler);
        self
    }

    /// Set the request filter.
    #[must_use]
    pub fn with_request_filter(mut self, filter: Middleware) -> Self {
        self.request_filter = Some(filter);
        self
    }

    /// Set TLS settings for the provider connection.
    #[must_use]
    pub fn with_custom_tls_config(mut self, tls: TlsConfig) -> Self {
        self.custom_tls_config = Some(tls);
        self
    }

    /// Check the request is complete enough to run.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::InvalidConfig`] when the provider base URL
    /// is missing, no contract source is given, or results would be
    /// published without a provider version.
    pub fn validate(&self) -> Result<(), VerificationError> {
        if self.provider_base_url.trim().is_empty() {
            return Err(VerificationError::invalid_config("provider base URL is required"));
        }

        if self.sources.is_empty() && self.broker.url.is_none() {
            return Err(VerificationError::invalid_config(
                "one of pact URLs, pact files, pact dirs or a broker URL is required",
            ));
        }

        if self.publish.publish_verification_results
            && self.publish.provider_version.as_deref().is_none_or(str::is_empty)
        {
            return Err(VerificationError::invalid_config(
                "provider version is required to publish verification results",
            ));
        }

        Ok(())
    }
}

/// What the verification engine is asked to verify.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Provider name
    pub provider: String,
    /// Base URL the engine sends interactions to (the proxy)
    pub provider_base_url: String,
    /// State setup URL; empty when states are not set up
    pub provider_states_setup_url: String,
    /// Contract locations
    pub sources: ContractSources,
    /// Broker settings
    pub broker: BrokerOptions,
    /// Publishing settings
    pub publish: PublishOptions,
    /// Fail when no contracts are found
    pub fail_if_no_pacts_found: bool,
}

impl EngineRequest {
    /// Mirror `request`, replacing the base and state setup URLs.
    #[must_use]
    pub fn from_verification_request(
        request: &VerificationRequest,
        provider_base_url: impl Into<String>,
        provider_states_setup_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: request.provider.clone(),
            provider_base_url: provider_base_url.into(),
            provider_states_setup_url: provider_states_setup_url.into(),
            sources: request.sources.clone(),
            broker: request.broker.clone(),
            publish: request.publish.clone(),
            fail_if_no_pacts_found: request.fail_if_no_pacts_found,
        }
    }
}
