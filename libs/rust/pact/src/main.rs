//! pact-provider-verify - Main Entry Point
//!
//! Verifies a running provider against its contracts through the
//! verification proxy, configured from `PACT_*` environment variables.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use pact_provider_proxy::{CliVerificationEngine, HttpVerifier, VerifierConfig};
use rust_common::init_tracing;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = VerifierConfig::from_env().context("failed to load configuration")?;
    let tracing = config.tracing_config();
    init_tracing(&tracing).context("failed to initialize tracing")?;

    let engine = Arc::new(CliVerificationEngine::new(&config.verifier_bin));
    info!(
        service = %tracing.service_name,
        provider = %config.provider_name,
        base_url = %config.provider_base_url,
        verifier = ?engine.program(),
        "starting provider verification"
    );

    let mut verifier = HttpVerifier::new(engine).with_client_timeout(config.client_timeout());
    let request = config
        .into_verification_request()
        .context("failed to build verification request")?;

    match verifier.verify_provider(&request).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if e.is_preflight() => Err(e).context("verification did not start"),
        Err(e) => {
            error!(error = %e, "provider does not satisfy its contracts");
            Ok(ExitCode::FAILURE)
        }
    }
}
