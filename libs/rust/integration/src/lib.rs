//! Helpers shared by the end-to-end tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use pact_provider_proxy::{HttpVerifier, VerificationEngine, VerificationRequest, VerificationResult};
use tracing::debug;

/// Readiness timeout used by the end-to-end tests.
pub const E2E_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `request` through a verifier driving `engine`.
///
/// # Errors
///
/// Returns whatever the verification run returns.
pub async fn run_verification(
    engine: Arc<dyn VerificationEngine>,
    request: &VerificationRequest,
) -> VerificationResult<()> {
    debug!(provider = %request.provider, base_url = %request.provider_base_url, "e2e verification");
    HttpVerifier::new(engine)
        .with_client_timeout(E2E_CLIENT_TIMEOUT)
        .verify_provider(request)
        .await
}
