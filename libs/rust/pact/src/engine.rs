//! Verification engine seam.
//!
//! The engine replays contract interactions against the proxy. The default
//! engine runs the `pact_verifier_cli` binary; tests substitute their own.

use std::ffi::OsString;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::EngineError;
use crate::request::EngineRequest;

/// Default verifier binary name.
pub const DEFAULT_VERIFIER_PROGRAM: &str = "pact_verifier_cli";

/// Replays interactions and reports the verdict.
#[async_trait]
pub trait VerificationEngine: Send + Sync {
    /// Verify every interaction in `request`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Failed`] when any interaction does not match.
    async fn verify(&self, request: &EngineRequest) -> Result<(), EngineError>;
}

/// Runs an external verifier process.
#[derive(Debug, Clone)]
pub struct CliVerificationEngine {
    program: OsString,
}

impl Default for CliVerificationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFIER_PROGRAM)
    }
}

impl CliVerificationEngine {
    /// Run `program` as the verifier.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program this engine launches.
    #[must_use]
    pub fn program(&self) -> &OsString {
        &self.program
    }

    /// Command line arguments for `request`. Broker credentials are passed
    /// through the environment instead, see [`Self::secret_env`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRequest`] if the provider base URL has
    /// no host or port.
    pub fn args(&self, request: &EngineRequest) -> Result<Vec<String>, EngineError> {
        let base = Url::parse(&request.provider_base_url)
            .map_err(|e| EngineError::InvalidRequest(format!("provider base URL: {e}")))?;
        let host = base
            .host_str()
            .ok_or_else(|| EngineError::InvalidRequest("provider base URL has no host".into()))?;
        let port = base
            .port_or_known_default()
            .ok_or_else(|| EngineError::InvalidRequest("provider base URL has no port".into()))?;

        let mut args = vec![
            "--provider-name".to_string(),
            request.provider.clone(),
            "--hostname".to_string(),
            host.to_string(),
            "--port".to_string(),
            port.to_string(),
            "--scheme".to_string(),
            base.scheme().to_string(),
        ];

        let path = base.path().trim_end_matches('/');
        if !path.is_empty() {
            args.extend(["--base-path".to_string(), path.to_string()]);
        }

        for file in &request.sources.pact_files {
            args.extend(["--file".to_string(), file.display().to_string()]);
        }
        for dir in &request.sources.pact_dirs {
            args.extend(["--dir".to_string(), dir.display().to_string()]);
        }
        for url in &request.sources.pact_urls {
            args.extend(["--url".to_string(), url.clone()]);
        }

        if let Some(url) = &request.broker.url {
            args.extend(["--broker-url".to_string(), url.clone()]);
            if let Some(user) = &request.broker.username {
                args.extend(["--user".to_string(), user.clone()]);
            }
            if !request.broker.consumer_tags.is_empty() {
                args.extend([
                    "--consumer-version-tags".to_string(),
                    request.broker.consumer_tags.join(","),
                ]);
            }
        }

        if !request.provider_states_setup_url.is_empty() {
            args.extend([
                "--state-change-url".to_string(),
                request.provider_states_setup_url.clone(),
            ]);
        }

        if request.publish.publish_verification_results {
            args.push("--publish".to_string());
            if let Some(version) = &request.publish.provider_version {
                args.extend(["--provider-version".to_string(), version.clone()]);
            }
            if !request.publish.provider_tags.is_empty() {
                args.extend([
                    "--provider-tags".to_string(),
                    request.publish.provider_tags.join(","),
                ]);
            }
        }

        if !request.fail_if_no_pacts_found {
            args.push("--ignore-no-pacts-error".to_string());
        }

        Ok(args)
    }

    /// Environment variables carrying broker credentials.
    #[must_use]
    pub fn secret_env(request: &EngineRequest) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        if let Some(password) = &request.broker.password {
            env.push(("PACT_BROKER_PASSWORD", password.expose_secret().to_string()));
        }
        if let Some(token) = &request.broker.token {
            env.push(("PACT_BROKER_TOKEN", token.expose_secret().to_string()));
        }
        env
    }
}

#[async_trait]
impl VerificationEngine for CliVerificationEngine {
    async fn verify(&self, request: &EngineRequest) -> Result<(), EngineError> {
        let args = self.args(request)?;
        let program = self.program.to_string_lossy().into_owned();
        debug!(%program, ?args, "launching verifier");

        let status = Command::new(&self.program)
            .args(&args)
            .envs(Self::secret_env(request))
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| EngineError::Launch {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            info!(provider = %request.provider, "verifier reported success");
            Ok(())
        } else {
            warn!(%program, %status, "verifier reported failure");
            Err(EngineError::failed(format!("{program} exited with {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{BrokerOptions, PublishOptions, VerificationRequest};
    use secrecy::SecretString;

    fn engine_request(request: &VerificationRequest) -> EngineRequest {
        EngineRequest::from_verification_request(request, "http://localhost:41234", "")
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_args_target_proxy() {
        let request = VerificationRequest::new("token-service", "http://provider:8080")
            .with_pact_file("pacts/a.json")
            .with_pact_dir("pacts");
        let args = CliVerificationEngine::default()
            .args(&engine_request(&request))
            .unwrap();

        assert_eq!(flag_value(&args, "--provider-name"), Some("token-service"));
        assert_eq!(flag_value(&args, "--hostname"), Some("localhost"));
        assert_eq!(flag_value(&args, "--port"), Some("41234"));
        assert_eq!(flag_value(&args, "--file"), Some("pacts/a.json"));
        assert_eq!(flag_value(&args, "--dir"), Some("pacts"));
        assert!(!args.contains(&"--state-change-url".to_string()));
        assert!(!args.contains(&"--base-path".to_string()));
        assert!(args.contains(&"--ignore-no-pacts-error".to_string()));
    }

    #[test]
    fn test_args_state_change_and_publish() {
        let request = VerificationRequest::new("token-service", "http://provider:8080")
            .with_pact_url("https://broker.example.com/pacts/1")
            .with_publish(PublishOptions {
                publish_verification_results: true,
                provider_version: Some("1.0.0".to_string()),
                provider_tags: vec!["main".to_string(), "prod".to_string()],
            })
            .with_fail_if_no_pacts_found(true);
        let engine = EngineRequest::from_verification_request(
            &request,
            "http://localhost:41234",
            "http://localhost:41234/__setup/",
        );

        let args = CliVerificationEngine::default().args(&engine).unwrap();

        assert_eq!(
            flag_value(&args, "--state-change-url"),
            Some("http://localhost:41234/__setup/")
        );
        assert!(args.contains(&"--publish".to_string()));
        assert_eq!(flag_value(&args, "--provider-version"), Some("1.0.0"));
        assert_eq!(flag_value(&args, "--provider-tags"), Some("main,prod"));
        assert!(!args.contains(&"--ignore-no-pacts-error".to_string()));
    }

    #[test]
    fn test_broker_secrets_stay_out_of_args() {
        let request = VerificationRequest::new("token-service", "http://provider:8080").with_broker(
            BrokerOptions {
                url: Some("https://broker.example.com".to_string()),
                username: Some("ci".to_string()),
                password: Some(SecretString::from("hunter2")),
                token: Some(SecretString::from("abc123")),
                consumer_tags: vec!["prod".to_string()],
            },
        );
        let engine = engine_request(&request);

        let args = CliVerificationEngine::default().args(&engine).unwrap();
        assert_eq!(flag_value(&args, "--broker-url"), Some("https://broker.example.com"));
        assert_eq!(flag_value(&args, "--user"), Some("ci"));
        assert_eq!(flag_value(&args, "--consumer-version-tags"), Some("prod"));
        assert!(!args.iter().any(|a| a.contains("hunter2") || a.contains("abc123")));

        let env = CliVerificationEngine::secret_env(&engine);
        assert_eq!(
            env,
            vec![
                ("PACT_BROKER_PASSWORD", "hunter2".to_string()),
                ("PACT_BROKER_TOKEN", "abc123".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let request = VerificationRequest::new("token-service", "http://provider:8080");
        let engine = EngineRequest::from_verification_request(&request, "not a url", "");

        let result = CliVerificationEngine::default().args(&engine);
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
    }

    #[test]
    fn test_program() {
        assert_eq!(CliVerificationEngine::default().program(), DEFAULT_VERIFIER_PROGRAM);
        assert_eq!(CliVerificationEngine::new("/opt/pact/bin/verifier").program(), "/opt/pact/bin/verifier");
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let request = VerificationRequest::new("token-service", "http://provider:8080");
        let engine = CliVerificationEngine::new("definitely-not-a-real-verifier-binary");

        let result = engine.verify(&engine_request(&request)).await;
        assert!(matches!(result, Err(EngineError::Launch { .. })));
    }
}
