//! State handler middleware.
//!
//! Answers state change requests posted by the verification engine to
//! [`PROVIDER_STATES_SETUP_PATH`] by running the matching [`StateHandler`].
//! The request is never passed further down the chain.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{error, info, trace, warn};

use crate::pipeline::{Middleware, status_response};
use crate::state::{PROVIDER_STATES_SETUP_PATH, ProviderState, StateChangeAction, StateHandlers};

/// Largest state change payload accepted.
const MAX_STATE_CHANGE_BYTES: usize = 1024 * 1024;

/// Middleware dispatching state setup requests to `handlers`.
#[must_use]
pub fn state_handler_middleware(handlers: StateHandlers) -> Middleware {
    Middleware::from_layer(StateHandlerLayer::new(handlers))
}

/// Tower layer for provider state dispatch
#[derive(Clone, Debug)]
pub struct StateHandlerLayer {
    handlers: Arc<StateHandlers>,
}

impl StateHandlerLayer {
    /// Creates a new state handler layer
    #[must_use]
    pub fn new(handlers: StateHandlers) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }
}

impl<S> Layer<S> for StateHandlerLayer {
    type Service = StateHandlerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StateHandlerService {
            inner,
            handlers: Arc::clone(&self.handlers),
        }
    }
}

/// State handler service wrapper
#[derive(Clone, Debug)]
pub struct StateHandlerService<S> {
    inner: S,
    handlers: Arc<StateHandlers>,
}

impl<S> Service<Request<Body>> for StateHandlerService<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        if req.uri().path() == PROVIDER_STATES_SETUP_PATH {
            let handlers = Arc::clone(&self.handlers);
            return Box::pin(async move { Ok(change_state(&handlers, req.into_body()).await) });
        }

        trace!(uri = %req.uri(), "skipping state handler for request");

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(inner.call(req))
    }
}

/// Decode a state change and run its handler.
async fn change_state(handlers: &StateHandlers, body: Body) -> Response<Body> {
    info!("executing state handler middleware");

    let payload = match to_bytes(body, MAX_STATE_CHANGE_BYTES).await {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "unable to read incoming state change payload");
            return status_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    trace!(payload = %String::from_utf8_lossy(&payload), "state handler received input");

    let action = match StateChangeAction::from_slice(&payload) {
        Ok(action) => action,
        Err(e) => {
            error!(error = %e, "unable to decode incoming state change payload");
            return status_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let Some(handler) = handlers.get(&action.state) else {
        warn!(state = %action.state, "no state handler found for state");
        return status_response(StatusCode::OK);
    };

    if let Err(e) = handler.call(ProviderState::new(&action.state)).await {
        error!(state = %action.state, action = %action.action, error = %e, "state handler errored");
        return status_response(StatusCode::INTERNAL_SERVER_ERROR);
    }

    status_response(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{HttpHandler, handler_fn};
    use crate::state::StateHandler;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn counting_inner(calls: &Arc<AtomicUsize>) -> HttpHandler {
        let calls = Arc::clone(calls);
        handler_fn(move |_req| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { status_response(StatusCode::ACCEPTED) }
        })
    }

    fn recording_handlers(seen: &Arc<Mutex<Vec<ProviderState>>>) -> StateHandlers {
        let seen_ok = Arc::clone(seen);
        let seen_err = Arc::clone(seen);
        StateHandlers::from([
            (
                "user exists".to_string(),
                StateHandler::from_fn(move |state| {
                    seen_ok.lock().unwrap().push(state.clone());
                    Ok(())
                }),
            ),
            (
                "database down".to_string(),
                StateHandler::from_fn(move |state| {
                    seen_err.lock().unwrap().push(state.clone());
                    anyhow::bail!("cannot simulate outage")
                }),
            ),
        ])
    }

    fn setup(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(PROVIDER_STATES_SETUP_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_matching_state_runs_handler_once() {
        let seen = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let service = StateHandlerLayer::new(recording_handlers(&seen)).layer(counting_inner(&calls));

        let response = service
            .oneshot(setup(r#"{"action":"setup","state":"user exists"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), vec![ProviderState::new("user exists")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_state_is_ok() {
        let seen = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let service = StateHandlerLayer::new(recording_handlers(&seen)).layer(counting_inner(&calls));

        let response = service
            .oneshot(setup(r#"{"action":"setup","state":"nobody home"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_server_error() {
        let seen = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let service = StateHandlerLayer::new(recording_handlers(&seen)).layer(counting_inner(&calls));

        let response = service.oneshot(setup("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_null_state_is_unmatched() {
        let seen = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let handlers = recording_handlers(&seen);

        for body in [r#"{"action":"setup","state":null}"#, "null"] {
            let service = StateHandlerLayer::new(handlers.clone()).layer(counting_inner(&calls));
            let response = service.oneshot(setup(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_handler_is_server_error() {
        let seen = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let service = StateHandlerLayer::new(recording_handlers(&seen)).layer(counting_inner(&calls));

        let response = service
            .oneshot(setup(r#"{"action":"setup","state":"database down"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_other_paths_pass_through() {
        let seen = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let service = StateHandlerLayer::new(recording_handlers(&seen)).layer(counting_inner(&calls));

        let request = Request::builder().uri("/__setup/extra").body(Body::empty()).unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
