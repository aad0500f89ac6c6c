//! Middleware Pipeline Builder
//!
//! A middleware is a function from the next handler to a new handler. The
//! verification proxy installs them in a fixed order around the
//! pass-through to the real provider:
//!
//! 1. BeforeEach - runs the before hook on state setup requests
//! 2. AfterEach - runs the after hook once an interaction has been served
//! 3. StateHandler - answers state setup requests
//! 4. RequestFilter - caller supplied
//! 5. Pass-through - forwards to the provider

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

use crate::hooks::{after_each_middleware, before_each_middleware};
use crate::request::VerificationRequest;
use crate::state_handler::state_handler_middleware;

/// A type-erased request handler.
pub type HttpHandler = BoxCloneSyncService<Request<Body>, Response<Body>, Infallible>;

/// Wraps a handler, returning a handler.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(HttpHandler) -> HttpHandler + Send + Sync>);

impl Middleware {
    /// Create a middleware from a wrapping function.
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(HttpHandler) -> HttpHandler + Send + Sync + 'static,
    {
        Self(Arc::new(wrap))
    }

    /// Create a middleware from a tower layer.
    pub fn from_layer<L>(layer: L) -> Self
    where
        L: Layer<HttpHandler> + Send + Sync + 'static,
        L::Service: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    {
        Self::new(move |next| BoxCloneSyncService::new(layer.layer(next)))
    }

    /// Wrap `next`.
    #[must_use]
    pub fn wrap(&self, next: HttpHandler) -> HttpHandler {
        (self.0)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Build a handler from an async function.
pub fn handler_fn<F, Fut>(f: F) -> HttpHandler
where
    F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    BoxCloneSyncService::new(tower::service_fn(move |req| {
        let fut = f(req);
        async move { Ok::<_, Infallible>(fut.await) }
    }))
}

/// Run `req` through `handler`.
pub async fn serve(handler: HttpHandler, req: Request<Body>) -> Response<Body> {
    let Ok(response) = handler.oneshot(req).await;
    response
}

/// An empty response with the given status.
#[must_use]
pub fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// Assemble the middleware for a verification run, outermost first.
///
/// Components absent from the request are omitted.
#[must_use]
pub fn build_middleware(request: &VerificationRequest) -> Vec<Middleware> {
    let mut middleware = Vec::new();

    if let Some(hook) = &request.before_each {
        middleware.push(before_each_middleware(hook.clone()));
    }

    if let Some(hook) = &request.after_each {
        middleware.push(after_each_middleware(hook.clone()));
    }

    if !request.state_handlers.is_empty() {
        middleware.push(state_handler_middleware(request.state_handlers.clone()));
    }

    if let Some(filter) = &request.request_filter {
        middleware.push(filter.clone());
    }

    middleware
}

/// Compose `middleware` around `inner`; the first entry sees requests first.
#[must_use]
pub fn compose(middleware: &[Middleware], inner: HttpHandler) -> HttpHandler {
    middleware
        .iter()
        .rev()
        .fold(inner, |next, layer| layer.wrap(next))
}
