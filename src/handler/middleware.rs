//! Middleware and chain continuation.

use std::future::Future;
use std::sync::Arc;

use axum::{body::Body, http::Request};
use futures_util::future::BoxFuture;

use super::{Endpoint, Handler, Layer};
use crate::pipeline::{Outcome, RequestContext};

/// A pass-through step registered ahead of a terminal handler.
#[derive(Clone)]
pub struct Middleware {
    layer: Arc<dyn Layer>,
}

impl Middleware {
    pub(crate) fn layer(&self) -> Arc<dyn Layer> {
        self.layer.clone()
    }
}

impl Handler {
    /// Adapt `async fn(RequestContext, Request<Body>, Next) -> impl Into<Outcome>`.
    ///
    /// Returning without calling [`Next::run`] short-circuits the chain.
    pub fn middleware<F, Fut>(f: F) -> Handler
    where
        F: Fn(RequestContext, Request<Body>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Into<Outcome>,
    {
        Handler::Middleware(Middleware {
            layer: Arc::new(MiddlewareFn { f }),
        })
    }
}

struct MiddlewareFn<F> {
    f: F,
}

impl<F, Fut> Layer for MiddlewareFn<F>
where
    F: Fn(RequestContext, Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Into<Outcome>,
{
    fn call(&self, ctx: RequestContext, request: Request<Body>, next: Next) -> BoxFuture<'static, Outcome> {
        let fut = (self.f)(ctx, request, next);
        Box::pin(async move { fut.await.into() })
    }
}

/// The rest of the chain after the current middleware.
pub struct Next {
    ctx: RequestContext,
    layers: Arc<[Arc<dyn Layer>]>,
    endpoint: Arc<dyn Endpoint>,
    index: usize,
}

impl Next {
    pub(crate) fn new(
        ctx: RequestContext,
        layers: Arc<[Arc<dyn Layer>]>,
        endpoint: Arc<dyn Endpoint>,
    ) -> Self {
        Self {
            ctx,
            layers,
            endpoint,
            index: 0,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Run the remaining middleware and the terminal handler.
    pub async fn run(mut self, request: Request<Body>) -> Outcome {
        match self.layers.get(self.index).cloned() {
            Some(layer) => {
                self.index += 1;
                let ctx = self.ctx.clone();
                layer.call(ctx, request, self).await
            }
            None => self.endpoint.call(self.ctx.clone(), request).await,
        }
    }
}
