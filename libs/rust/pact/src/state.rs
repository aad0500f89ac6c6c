//! Provider states and the state-change wire payload.

use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Reserved path the verification engine posts state changes to.
///
/// Requests on this path are handled by the proxy and never forwarded to
/// the provider.
pub const PROVIDER_STATES_SETUP_PATH: &str = "/__setup/";

/// The provider state being requested for the next interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    /// State name, e.g. `"User foo exists"`
    pub name: String,
}

impl ProviderState {
    /// Create a provider state.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// State change payload, e.g. `{"action":"teardown","state":"User foo exists"}`.
///
/// Missing and `null` fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeAction {
    /// `setup` or `teardown`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub action: String,
    /// Name of the provider state
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
}

impl StateChangeAction {
    /// Decode a state change payload. A bare `null` decodes as the default.
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed JSON or wrongly typed fields.
    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice::<Option<Self>>(payload).map(Option::unwrap_or_default)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Future returned by a state handler.
pub type StateHandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// User code that puts the provider into a named state.
///
/// Handlers may be invoked concurrently and must synchronize any shared
/// state themselves.
#[derive(Clone)]
pub struct StateHandler(Arc<dyn Fn(ProviderState) -> StateHandlerFuture + Send + Sync>);

impl StateHandler {
    /// Wrap an async state handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(ProviderState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move |state| Box::pin(handler(state))))
    }

    /// Wrap a synchronous state handler.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&ProviderState) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(move |state| std::future::ready(handler(&state)))
    }

    /// Run the handler for `state`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the handler reports.
    pub async fn call(&self, state: ProviderState) -> anyhow::Result<()> {
        (self.0)(state).await
    }
}

impl fmt::Debug for StateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateHandler")
    }
}

/// State handlers keyed by exact state name.
pub type StateHandlers = HashMap<String, StateHandler>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_state_change() {
        let action: StateChangeAction =
            serde_json::from_str(r#"{"action":"teardown","id":"foo","state":"User foo exists"}"#)
                .unwrap();
        assert_eq!(action.action, "teardown");
        assert_eq!(action.state, "User foo exists");
    }

    #[test]
    fn test_decode_missing_fields() {
        let action: StateChangeAction = serde_json::from_str("{}").unwrap();
        assert_eq!(action, StateChangeAction::default());
    }

    #[test]
    fn test_decode_null_as_empty() {
        let action = StateChangeAction::from_slice(br#"{"action":"setup","state":null}"#).unwrap();
        assert_eq!(action.action, "setup");
        assert_eq!(action.state, "");

        let action = StateChangeAction::from_slice(b"null").unwrap();
        assert_eq!(action, StateChangeAction::default());
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        assert!(StateChangeAction::from_slice(b"").is_err());
        assert!(StateChangeAction::from_slice(b"[]").is_err());
        assert!(serde_json::from_str::<StateChangeAction>(r#"{"state":42}"#).is_err());
        assert!(serde_json::from_str::<StateChangeAction>("not json").is_err());
    }

    #[tokio::test]
    async fn test_sync_handler_receives_state() {
        let handler = StateHandler::from_fn(|state| {
            anyhow::ensure!(state.name == "user exists", "unexpected state {}", state.name);
            Ok(())
        });

        assert!(handler.call(ProviderState::new("user exists")).await.is_ok());
        assert!(handler.call(ProviderState::new("other")).await.is_err());
    }
}
