//! Test fixtures with sample data.

use axum::body::Body;
use axum::http::Request;
use pact_provider_proxy::{PROVIDER_STATES_SETUP_PATH, VerificationRequest};

/// Sample provider name.
pub const SAMPLE_PROVIDER: &str = "token-service";

/// Sample contract file path.
pub const SAMPLE_PACT_FILE: &str = "./pacts/auth-edge-token-service.json";

/// A valid request for a provider at `base_url`.
#[must_use]
pub fn sample_request(base_url: &str) -> VerificationRequest {
    VerificationRequest::new(SAMPLE_PROVIDER, base_url).with_pact_file(SAMPLE_PACT_FILE)
}

/// JSON body the engine posts to change provider state.
#[must_use]
pub fn state_change_body(state: &str) -> String {
    serde_json::json!({ "action": "setup", "state": state }).to_string()
}

/// A state setup request as the engine sends it.
///
/// # Panics
///
/// Never for the fixed method and path used here.
#[must_use]
#[allow(clippy::expect_used)]
pub fn setup_request(state: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(PROVIDER_STATES_SETUP_PATH)
        .header("content-type", "application/json")
        .body(Body::from(state_change_body(state)))
        .expect("static setup request")
}

/// An interaction request.
///
/// # Panics
///
/// If `method` or `path` is not valid HTTP.
#[must_use]
#[allow(clippy::expect_used)]
pub fn interaction_request(method: &str, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("valid interaction request")
}
