//! Shared proptest generators.

use proptest::prelude::*;

/// Generate provider names.
pub fn provider_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("token-service".to_string()),
        Just("session-identity-core".to_string()),
        Just("iam-policy-service".to_string()),
        "[a-z][a-z0-9-]{2,20}",
    ]
}

/// Generate provider state names, including whitespace and punctuation.
pub fn state_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("user exists".to_string()),
        Just("user 1 has an active session".to_string()),
        Just("no tokens issued".to_string()),
        "[A-Za-z0-9 ,.'-]{1,40}",
    ]
}

/// Generate request paths that never touch the state setup path.
pub fn interaction_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9]{1,12}", 0..4).prop_map(|segments| {
        if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", segments.join("/"))
        }
    })
}

/// Generate HTTP methods used by interactions.
pub fn http_method_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET".to_string()),
        Just("POST".to_string()),
        Just("PUT".to_string()),
        Just("PATCH".to_string()),
        Just("DELETE".to_string()),
    ]
}

/// Generate proxy ports.
pub fn port_strategy() -> impl Strategy<Value = u16> {
    1024u16..=65535
}
