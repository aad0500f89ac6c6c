//! Property-based tests for rust-common crate.
//!
//! These tests verify universal properties across all inputs using proptest.

use proptest::prelude::*;
use rust_common::{HttpConfig, PlatformError, TlsConfig, build_http_client};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_config_errors_are_not_retryable(msg in "[a-zA-Z0-9 ]{1,50}") {
        prop_assert!(!PlatformError::tls(&msg).is_retryable());
        prop_assert!(!PlatformError::internal(&msg).is_retryable());
    }

    #[test]
    fn prop_error_display_carries_message(msg in "[a-zA-Z0-9 ]{1,50}") {
        prop_assert!(PlatformError::tls(&msg).to_string().contains(&msg));
        prop_assert!(PlatformError::internal(&msg).to_string().contains(&msg));
    }

    #[test]
    fn prop_client_builds_for_any_timeouts(
        timeout_ms in 1u64..120_000,
        connect_ms in 1u64..60_000,
        follow_redirects in proptest::bool::ANY,
        insecure in proptest::bool::ANY,
    ) {
        let mut config = HttpConfig::default()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_connect_timeout(Duration::from_millis(connect_ms))
            .with_tls(Some(TlsConfig::default().with_accept_invalid_certs(insecure)));
        if !follow_redirects {
            config = config.without_redirects();
        }

        prop_assert!(build_http_client(&config).is_ok());
    }
}
