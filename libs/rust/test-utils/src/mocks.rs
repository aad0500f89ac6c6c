//! Mock implementations for testing.
//!
//! Engines and waiters that stand in for the real verifier, plus hooks and
//! state handlers that record when they run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pact_provider_proxy::{
    EngineError, EngineRequest, Hook, Network, ReadinessError, ReadinessWaiter, StateHandler,
    VerificationEngine,
};
use tokio::sync::RwLock;

/// Shared, ordered record of events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<RwLock<Vec<String>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub async fn record(&self, event: impl Into<String>) {
        self.events.write().await.push(event.into());
    }

    /// All events in order.
    pub async fn events(&self) -> Vec<String> {
        self.events.read().await.clone()
    }

    /// Number of events equal to `event`.
    pub async fn count(&self, event: &str) -> usize {
        self.events.read().await.iter().filter(|e| *e == event).count()
    }

    /// Hook recording `name`, failing afterwards when `fail` is set.
    #[must_use]
    pub fn hook(&self, name: &'static str, fail: bool) -> Hook {
        let log = self.clone();
        Hook::new(move || {
            let log = log.clone();
            async move {
                log.record(name).await;
                if fail {
                    anyhow::bail!("{name} hook failed");
                }
                Ok(())
            }
        })
    }

    /// State handler recording `state:<name>`.
    #[must_use]
    pub fn state_handler(&self) -> StateHandler {
        let log = self.clone();
        StateHandler::new(move |state| {
            let log = log.clone();
            async move {
                log.record(format!("state:{}", state.name)).await;
                Ok(())
            }
        })
    }
}

/// Engine that records requests and returns a fixed verdict.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    requests: RwLock<Vec<EngineRequest>>,
    failure: Option<String>,
}

impl RecordingEngine {
    /// Engine that always passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that always fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            requests: RwLock::default(),
            failure: Some(reason.into()),
        }
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<EngineRequest> {
        self.requests.read().await.clone()
    }

    /// Number of runs.
    pub async fn calls(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl VerificationEngine for RecordingEngine {
    async fn verify(&self, request: &EngineRequest) -> Result<(), EngineError> {
        self.requests.write().await.push(request.clone());
        match &self.failure {
            Some(reason) => Err(EngineError::failed(reason.clone())),
            None => Ok(()),
        }
    }
}

/// One interaction replayed by [`ReplayEngine`].
#[derive(Debug, Clone)]
pub struct ScriptedInteraction {
    /// Provider state to set up first
    pub state: Option<String>,
    /// HTTP method
    pub method: reqwest::Method,
    /// Path and query
    pub path: String,
    /// Status the provider should answer with
    pub expected_status: u16,
}

impl ScriptedInteraction {
    /// `GET path` expecting 200, without a provider state.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            state: None,
            method: reqwest::Method::GET,
            path: path.into(),
            expected_status: 200,
        }
    }

    /// Set up `state` before the request.
    #[must_use]
    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Expect `status` from the provider.
    #[must_use]
    pub const fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }
}

/// Engine that replays scripted interactions over HTTP the way a real
/// verifier does: state setup first, then the interaction itself.
#[derive(Debug)]
pub struct ReplayEngine {
    client: reqwest::Client,
    interactions: Vec<ScriptedInteraction>,
    setup_statuses: RwLock<Vec<u16>>,
}

impl ReplayEngine {
    /// Replay `interactions` in order.
    #[must_use]
    pub fn new(interactions: Vec<ScriptedInteraction>) -> Self {
        Self {
            client: reqwest::Client::new(),
            interactions,
            setup_statuses: RwLock::default(),
        }
    }

    /// Statuses returned by state setup calls.
    pub async fn setup_statuses(&self) -> Vec<u16> {
        self.setup_statuses.read().await.clone()
    }

    async fn set_up_state(&self, url: &str, state: &str) -> Result<(), EngineError> {
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "action": "setup", "state": state }))
            .send()
            .await
            .map_err(|e| EngineError::failed(format!("state setup for '{state}': {e}")))?;

        let status = response.status();
        self.setup_statuses.write().await.push(status.as_u16());
        if !status.is_success() {
            return Err(EngineError::failed(format!(
                "state setup for '{state}' returned {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VerificationEngine for ReplayEngine {
    async fn verify(&self, request: &EngineRequest) -> Result<(), EngineError> {
        for interaction in &self.interactions {
            if let Some(state) = &interaction.state {
                if !request.provider_states_setup_url.is_empty() {
                    self.set_up_state(&request.provider_states_setup_url, state)
                        .await?;
                }
            }

            let url = format!("{}{}", request.provider_base_url, interaction.path);
            let response = self
                .client
                .request(interaction.method.clone(), &url)
                .send()
                .await
                .map_err(|e| EngineError::failed(format!("{url}: {e}")))?;

            if response.status().as_u16() != interaction.expected_status {
                return Err(EngineError::failed(format!(
                    "{} {}: expected status {} but was {}",
                    interaction.method,
                    interaction.path,
                    interaction.expected_status,
                    response.status()
                )));
            }
        }
        Ok(())
    }
}

/// Readiness waiter that answers without touching the network.
#[derive(Debug, Default)]
pub struct ScriptedReadinessWaiter {
    ready: bool,
    calls: AtomicUsize,
}

impl ScriptedReadinessWaiter {
    /// Waiter that reports the port ready.
    #[must_use]
    pub fn ready() -> Self {
        Self {
            ready: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Waiter that always times out.
    #[must_use]
    pub fn never_ready() -> Self {
        Self::default()
    }

    /// Number of waits.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessWaiter for ScriptedReadinessWaiter {
    async fn wait(
        &self,
        _port: u16,
        _network: Network,
        _address: &str,
        timeout: Duration,
        message: &str,
    ) -> Result<(), ReadinessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.ready {
            Ok(())
        } else {
            Err(ReadinessError::Timeout {
                timeout,
                message: message.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_log_hook() {
        let log = EventLog::new();
        assert!(log.hook("before", false).run().await.is_ok());
        assert!(log.hook("after", true).run().await.is_err());
        assert_eq!(log.events().await, vec!["before", "after"]);
        assert_eq!(log.count("before").await, 1);
    }

    #[tokio::test]
    async fn test_scripted_waiter() {
        let waiter = ScriptedReadinessWaiter::never_ready();
        let result = waiter
            .wait(1, Network::Tcp, "localhost", Duration::from_secs(1), "down")
            .await;
        assert!(result.is_err());
        assert_eq!(waiter.calls(), 1);
    }
}
