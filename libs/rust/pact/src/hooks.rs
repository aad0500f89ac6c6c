//! Before / After hook middleware.
//!
//! The before hook fires on the state setup request that opens a group of
//! interactions. The after hook fires once each interaction has been served,
//! and never on the state setup request itself.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::pipeline::{Middleware, status_response};
use crate::state::PROVIDER_STATES_SETUP_PATH;

/// User code run around interactions.
#[derive(Clone)]
pub struct Hook(Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>);

impl Hook {
    /// Wrap an async hook.
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(hook())))
    }

    /// Wrap a synchronous hook.
    pub fn from_fn<F>(hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(move || std::future::ready(hook()))
    }

    /// Run the hook.
    ///
    /// # Errors
    ///
    /// Returns whatever error the hook reports.
    pub async fn run(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

/// Middleware running `hook` before the state setup request is handled.
#[must_use]
pub fn before_each_middleware(hook: Hook) -> Middleware {
    Middleware::from_layer(BeforeEachLayer::new(hook))
}

/// Middleware running `hook` after every non setup request.
#[must_use]
pub fn after_each_middleware(hook: Hook) -> Middleware {
    Middleware::from_layer(AfterEachLayer::new(hook))
}

/// Tower layer for the before hook
#[derive(Clone, Debug)]
pub struct BeforeEachLayer {
    hook: Hook,
}

impl BeforeEachLayer {
    /// Creates a new before-each layer
    #[must_use]
    pub const fn new(hook: Hook) -> Self {
        Self { hook }
    }
}

impl<S> Layer<S> for BeforeEachLayer {
    type Service = BeforeEachService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BeforeEachService {
            inner,
            hook: self.hook.clone(),
        }
    }
}

/// Before hook service wrapper
#[derive(Clone, Debug)]
pub struct BeforeEachService<S> {
    inner: S,
    hook: Hook,
}

impl<S> Service<Request<Body>> for BeforeEachService<S>
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
        let is_setup = req.uri().path() == PROVIDER_STATES_SETUP_PATH;
        let hook = self.hook.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut hook_failed = false;
            if is_setup {
                debug!("executing before hook");
                if let Err(e) = hook.run().await {
                    error!(error = %e, "error executing before hook");
                    hook_failed = true;
                }
            }

            // The rest of the chain still runs; the failure only shows in the status.
            let response = inner.call(req).await?;

            if hook_failed {
                Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR))
            } else {
                Ok(response)
            }
        })
    }
}

/// Tower layer for the after hook
#[derive(Clone, Debug)]
pub struct AfterEachLayer {
    hook: Hook,
}

impl AfterEachLayer {
    /// Creates a new after-each layer
    #[must_use]
    pub const fn new(hook: Hook) -> Self {
        Self { hook }
    }
}

impl<S> Layer<S> for AfterEachLayer {
    type Service = AfterEachService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AfterEachService {
            inner,
            hook: self.hook.clone(),
        }
    }
}

/// After hook service wrapper
#[derive(Clone, Debug)]
pub struct AfterEachService<S> {
    inner: S,
    hook: Hook,
}

impl<S> Service<Request<Body>> for AfterEachService<S>
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
        let is_setup = req.uri().path() == PROVIDER_STATES_SETUP_PATH;
        let hook = self.hook.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(req).await?;

            if is_setup {
                return Ok(response);
            }

            debug!("executing after hook");
            match hook.run().await {
                Ok(()) => Ok(response),
                Err(e) => {
                    error!(error = %e, "error executing after hook");
                    Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR))
                }
            }
        })
    }
}
