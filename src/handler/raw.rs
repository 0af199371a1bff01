//! Raw handlers: transport-level request in, transport-level response out.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};

use super::{Endpoint, Handler};
use crate::pipeline::{Outcome, RequestContext};

/// A raw handler erased behind the endpoint interface.
///
/// No binding happens and the response is written as returned. The request
/// context is still available through the request extensions.
#[derive(Clone)]
pub struct RawHandler {
    endpoint: Arc<dyn Endpoint>,
}

impl RawHandler {
    pub(crate) fn endpoint(&self) -> Arc<dyn Endpoint> {
        self.endpoint.clone()
    }
}

impl Handler {
    /// Adapt `async fn(Request<Body>) -> impl IntoResponse`.
    pub fn raw<F, Fut, R>(f: F) -> Handler
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        Handler::Raw(RawHandler {
            endpoint: Arc::new(RawFn { f }),
        })
    }

    /// Adapt an infallible tower service.
    pub fn service<S>(service: S) -> Handler
    where
        S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse + 'static,
        S::Future: Send + 'static,
    {
        Handler::Raw(RawHandler {
            endpoint: Arc::new(RawService { service }),
        })
    }
}

struct RawFn<F> {
    f: F,
}

impl<F, Fut, R> Endpoint for RawFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    fn call(&self, _ctx: RequestContext, request: Request<Body>) -> BoxFuture<'static, Outcome> {
        let fut = (self.f)(request);
        Box::pin(async move { Outcome::Raw(fut.await.into_response()) })
    }
}

struct RawService<S> {
    service: S,
}

impl<S> Endpoint for RawService<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse + 'static,
    S::Future: Send + 'static,
{
    fn call(&self, _ctx: RequestContext, request: Request<Body>) -> BoxFuture<'static, Outcome> {
        let service = self.service.clone();
        Box::pin(async move {
            let response: Response = match service.oneshot(request).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            };
            Outcome::Raw(response)
        })
    }
}
