//! Environment Configuration
//!
//! Builds a [`VerificationRequest`] for the `pact-provider-verify` binary
//! from `PACT_*` environment variables. Hooks and state handlers only exist
//! in code, so the binary relies on the legacy state setup URL.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use rust_common::{TlsConfig, TracingConfig};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::engine::DEFAULT_VERIFIER_PROGRAM;
use crate::request::{BrokerOptions, PublishOptions, VerificationRequest};
use crate::verifier::DEFAULT_CLIENT_TIMEOUT;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable name
        field: String,
        /// Parse failure
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parse failure
        reason: String,
    },

    /// A referenced file could not be read
    #[error("Failed to read {name} from {path:?}: {source}")]
    ReadFile {
        /// Variable name
        name: String,
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Verifier configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Provider name
    pub provider_name: String,
    /// Where the real provider listens
    pub provider_base_url: Url,
    /// Legacy external state setup URL
    pub provider_states_setup_url: Option<Url>,
    /// Local contract files
    pub pact_files: Vec<PathBuf>,
    /// Directories of contract files
    pub pact_dirs: Vec<PathBuf>,
    /// Contract URLs
    pub pact_urls: Vec<String>,
    /// Broker base URL
    pub broker_url: Option<Url>,
    /// Broker basic auth username
    pub broker_username: Option<String>,
    /// Broker basic auth password
    pub broker_password: Option<SecretString>,
    /// Broker bearer token
    pub broker_token: Option<SecretString>,
    /// Consumer version tags
    pub consumer_tags: Vec<String>,
    /// Publish verification results
    pub publish_results: bool,
    /// Provider version
    pub provider_version: Option<String>,
    /// Provider version tags
    pub provider_tags: Vec<String>,
    /// Fail when no contracts are found
    pub fail_if_no_pacts_found: bool,
    /// Readiness timeout in seconds (must be > 0)
    pub client_timeout_secs: u64,
    /// Verifier binary
    pub verifier_bin: String,
    /// Extra CA certificate for the provider connection
    pub tls_ca_cert: Option<PathBuf>,
    /// Skip provider certificate verification
    pub tls_insecure: bool,
    /// Log level
    pub log_level: String,
    /// JSON log output
    pub log_json: bool,
}

impl VerifierConfig {
    /// Loads configuration from the process environment and `.env`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing or malformed variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing or malformed variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let provider_base_url = env
            .url("PACT_PROVIDER_BASE_URL")?
            .ok_or_else(|| ConfigError::MissingRequired("PACT_PROVIDER_BASE_URL".to_string()))?;

        let config = Self {
            provider_name: env
                .string("PACT_PROVIDER_NAME")
                .ok_or_else(|| ConfigError::MissingRequired("PACT_PROVIDER_NAME".to_string()))?,
            provider_base_url,
            provider_states_setup_url: env.url("PACT_PROVIDER_STATES_SETUP_URL")?,
            pact_files: env.list("PACT_FILES").into_iter().map(PathBuf::from).collect(),
            pact_dirs: env.list("PACT_DIRS").into_iter().map(PathBuf::from).collect(),
            pact_urls: env.list("PACT_URLS"),
            broker_url: env.url("PACT_BROKER_URL")?,
            broker_username: env.string("PACT_BROKER_USERNAME"),
            broker_password: env.string("PACT_BROKER_PASSWORD").map(SecretString::from),
            broker_token: env.string("PACT_BROKER_TOKEN").map(SecretString::from),
            consumer_tags: env.list("PACT_CONSUMER_TAGS"),
            publish_results: env.parse("PACT_PUBLISH_RESULTS", false)?,
            provider_version: env.string("PACT_PROVIDER_VERSION"),
            provider_tags: env.list("PACT_PROVIDER_TAGS"),
            fail_if_no_pacts_found: env.parse("PACT_FAIL_IF_NO_PACTS_FOUND", true)?,
            client_timeout_secs: env
                .parse("PACT_CLIENT_TIMEOUT_SECS", DEFAULT_CLIENT_TIMEOUT.as_secs())?,
            verifier_bin: env
                .string("PACT_VERIFIER_BIN")
                .unwrap_or_else(|| DEFAULT_VERIFIER_PROGRAM.to_string()),
            tls_ca_cert: env.string("PACT_TLS_CA_CERT").map(PathBuf::from),
            tls_insecure: env.parse("PACT_TLS_INSECURE", false)?,
            log_level: env.string("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: env.parse("LOG_JSON", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_timeout_secs == 0 {
            return Err(ConfigError::ParseError {
                name: "PACT_CLIENT_TIMEOUT_SECS".to_string(),
                reason: "timeout must be greater than 0".to_string(),
            });
        }
        if self.publish_results && self.provider_version.is_none() {
            return Err(ConfigError::MissingRequired("PACT_PROVIDER_VERSION".to_string()));
        }
        Ok(())
    }

    /// Readiness timeout.
    #[must_use]
    pub const fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    /// Tracing settings for the binary.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        let config = TracingConfig::default().with_log_level(&self.log_level);
        if self.log_json {
            config.with_json_output()
        } else {
            config
        }
    }

    /// TLS settings for the provider connection, if any were configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFile`] if the CA certificate is unreadable.
    pub fn tls_config(&self) -> Result<Option<TlsConfig>, ConfigError> {
        if self.tls_ca_cert.is_none() && !self.tls_insecure {
            return Ok(None);
        }

        let mut tls = TlsConfig::default().with_accept_invalid_certs(self.tls_insecure);
        if let Some(path) = &self.tls_ca_cert {
            let pem = std::fs::read(path).map_err(|source| ConfigError::ReadFile {
                name: "PACT_TLS_CA_CERT".to_string(),
                path: path.clone(),
                source,
            })?;
            tls = tls.with_root_certificate_pem(pem);
        }
        Ok(Some(tls))
    }

    /// Build the verification request this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFile`] if the CA certificate is unreadable.
    pub fn into_verification_request(self) -> Result<VerificationRequest, ConfigError> {
        let tls = self.tls_config()?;

        let mut request = VerificationRequest::new(self.provider_name, self.provider_base_url)
            .with_broker(BrokerOptions {
                url: self.broker_url.map(String::from),
                username: self.broker_username,
                password: self.broker_password,
                token: self.broker_token,
                consumer_tags: self.consumer_tags,
            })
            .with_publish(PublishOptions {
                publish_verification_results: self.publish_results,
                provider_version: self.provider_version,
                provider_tags: self.provider_tags,
            })
            .with_fail_if_no_pacts_found(self.fail_if_no_pacts_found);

        request.sources.pact_files = self.pact_files;
        request.sources.pact_dirs = self.pact_dirs;
        request.sources.pact_urls = self.pact_urls;

        if let Some(url) = self.provider_states_setup_url {
            request = request.with_provider_states_setup_url(url);
        }
        if let Some(tls) = tls {
            request = request.with_custom_tls_config(tls);
        }

        Ok(request)
    }
}

/// Variable lookup with the parse helpers.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty trimmed value.
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parse a variable with a default value.
    fn parse<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.string(name) {
            Some(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Parse an optional URL variable.
    fn url(&self, name: &str) -> Result<Option<Url>, ConfigError> {
        self.string(name)
            .map(|v| {
                Url::parse(&v).map_err(|e| ConfigError::InvalidUrl {
                    field: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Parse a comma-separated list variable.
    fn list(&self, name: &str) -> Vec<String> {
        self.string(name)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("PACT_PROVIDER_NAME", "token-service"),
        ("PACT_PROVIDER_BASE_URL", "http://localhost:8080"),
        ("PACT_DIRS", "./pacts"),
    ];

    #[test]
    fn test_defaults() {
        let config = VerifierConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.provider_name, "token-service");
        assert_eq!(config.provider_base_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.pact_dirs, vec![PathBuf::from("./pacts")]);
        assert_eq!(config.client_timeout(), DEFAULT_CLIENT_TIMEOUT);
        assert_eq!(config.verifier_bin, DEFAULT_VERIFIER_PROGRAM);
        assert!(config.fail_if_no_pacts_found);
        assert!(!config.publish_results);
        assert!(config.provider_states_setup_url.is_none());
        assert!(config.tls_config().unwrap().is_none());
    }

    #[test]
    fn test_missing_provider_url() {
        let result = VerifierConfig::from_lookup(lookup(&[("PACT_PROVIDER_NAME", "token-service")]));
        assert!(matches!(result, Err(ConfigError::MissingRequired(name)) if name == "PACT_PROVIDER_BASE_URL"));
    }

    #[test]
    fn test_invalid_url() {
        let result = VerifierConfig::from_lookup(lookup(&[
            ("PACT_PROVIDER_NAME", "token-service"),
            ("PACT_PROVIDER_BASE_URL", "not a url"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_invalid_bool() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PACT_PUBLISH_RESULTS", "maybe"));
        let result = VerifierConfig::from_lookup(lookup(&vars));
        assert!(matches!(result, Err(ConfigError::ParseError { name, .. }) if name == "PACT_PUBLISH_RESULTS"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PACT_CLIENT_TIMEOUT_SECS", "0"));
        assert!(VerifierConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_publish_requires_version() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PACT_PUBLISH_RESULTS", "true"));
        let result = VerifierConfig::from_lookup(lookup(&vars));
        assert!(matches!(result, Err(ConfigError::MissingRequired(name)) if name == "PACT_PROVIDER_VERSION"));
    }

    #[test]
    fn test_lists_are_trimmed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PACT_CONSUMER_TAGS", " main, prod ,,"));
        let config = VerifierConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.consumer_tags, vec!["main", "prod"]);
    }

    #[test]
    fn test_tracing_config() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("LOG_LEVEL", "debug"), ("LOG_JSON", "true")]);
        let tracing = VerifierConfig::from_lookup(lookup(&vars))
            .unwrap()
            .tracing_config();
        assert_eq!(tracing.log_level, "debug");
        assert!(tracing.json_output);
        assert_eq!(tracing.service_name, "pact-provider-verify");
    }

    #[test]
    fn test_into_verification_request() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PACT_FILES", "a.json,b.json"),
            ("PACT_BROKER_URL", "https://broker.example.com"),
            ("PACT_BROKER_TOKEN", "abc123"),
            ("PACT_PROVIDER_STATES_SETUP_URL", "http://localhost:8080/setup"),
            ("PACT_PUBLISH_RESULTS", "true"),
            ("PACT_PROVIDER_VERSION", "1.0.0"),
            ("PACT_TLS_INSECURE", "true"),
        ]);

        let request = VerifierConfig::from_lookup(lookup(&vars))
            .unwrap()
            .into_verification_request()
            .unwrap();

        assert_eq!(request.provider, "token-service");
        assert_eq!(request.sources.pact_files.len(), 2);
        assert_eq!(request.broker.url.as_deref(), Some("https://broker.example.com/"));
        assert_eq!(
            request.broker.token.as_ref().map(ExposeSecret::expose_secret),
            Some("abc123")
        );
        assert_eq!(request.provider_states_setup_url, "http://localhost:8080/setup");
        assert!(request.publish.publish_verification_results);
        assert!(request.custom_tls_config.as_ref().is_some_and(|tls| tls.accept_invalid_certs));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unreadable_ca_cert() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PACT_TLS_CA_CERT", "/nonexistent/ca.pem"));
        let result = VerifierConfig::from_lookup(lookup(&vars))
            .unwrap()
            .into_verification_request();
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
