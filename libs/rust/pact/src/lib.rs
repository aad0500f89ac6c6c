//! Pact provider verification proxy.
//!
//! Runs a local reverse proxy in front of the provider under test so that
//! provider state changes, before/after hooks and request filters can be
//! driven from code while a verification engine replays contract
//! interactions.
//!
//! # Flow
//! 1. [`HttpVerifier::verify_provider`] validates the [`VerificationRequest`]
//! 2. [`http_reverse_proxy`] starts the proxy with the middleware from
//!    [`build_middleware`]
//! 3. A [`ReadinessWaiter`] blocks until the proxy accepts connections
//! 4. The [`VerificationEngine`] replays interactions against the proxy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod proxy;
pub mod readiness;
pub mod request;
pub mod state;
pub mod state_handler;
pub mod verifier;

pub use config::{ConfigError, VerifierConfig};
pub use engine::{CliVerificationEngine, VerificationEngine};
pub use error::{EngineError, ProxyError, ReadinessError, VerificationError, VerificationResult};
pub use hooks::{Hook, after_each_middleware, before_each_middleware};
pub use pipeline::{HttpHandler, Middleware, build_middleware, compose, handler_fn, serve, status_response};
pub use proxy::{ProviderTarget, ProxyBinding, ProxyOptions, http_reverse_proxy};
pub use readiness::{Network, ReadinessWaiter, TcpReadinessWaiter};
pub use request::{BrokerOptions, ContractSources, EngineRequest, PublishOptions, VerificationRequest};
pub use state::{PROVIDER_STATES_SETUP_PATH, ProviderState, StateChangeAction, StateHandler, StateHandlers};
pub use state_handler::state_handler_middleware;
pub use verifier::{DEFAULT_CLIENT_TIMEOUT, HttpVerifier, provider_states_setup_url};
