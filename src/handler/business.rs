//! Typed business handlers.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::{body::Body, http::Request, http::StatusCode};
use futures_util::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};

use super::bind::bind_request;
use super::shape::{self, Shape};
use super::{ContractError, Endpoint, Handler};
use crate::envelope::{BizError, BoxError, Envelope};
use crate::pipeline::{Outcome, RequestContext};

/// What a business handler returns: optional data and an optional error.
///
/// Both may be present at once, in which case the error is rendered together
/// with the partial data.
pub struct Reply<T> {
    data: Option<T>,
    error: Option<BoxError>,
}

impl<T> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<BoxError>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
        }
    }

    /// Data and error together.
    pub fn partial(data: T, error: impl Into<BoxError>) -> Self {
        Self {
            data: Some(data),
            error: Some(error.into()),
        }
    }

    /// Success with no data.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }
}

/// Conversion from a business function's return value into a [`Reply`].
pub trait IntoReply: Send + 'static {
    type Data: Serialize + Send + 'static;

    fn into_reply(self) -> Reply<Self::Data>;
}

impl<T> IntoReply for Reply<T>
where
    T: Serialize + Send + 'static,
{
    type Data = T;

    fn into_reply(self) -> Reply<T> {
        self
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    type Data = T;

    fn into_reply(self) -> Reply<T> {
        match self {
            Ok(data) => Reply::ok(data),
            Err(error) => Reply::err(error),
        }
    }
}

/// A business function erased behind the endpoint interface.
#[derive(Clone)]
pub struct TypedHandler {
    endpoint: Arc<dyn Endpoint>,
    request_type: &'static str,
    probe: fn() -> Shape,
}

impl TypedHandler {
    pub fn request_type(&self) -> &'static str {
        self.request_type
    }

    pub(crate) fn endpoint(&self) -> Arc<dyn Endpoint> {
        self.endpoint.clone()
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), ContractError> {
        let shape = (self.probe)();
        if shape.is_struct_like() {
            Ok(())
        } else {
            Err(ContractError::RequestShape {
                index,
                type_name: self.request_type,
                found: shape.describe(),
            })
        }
    }
}

impl Handler {
    /// Adapt `async fn(RequestContext, Req) -> impl IntoReply`.
    ///
    /// `Req` starts from its default value and is bound from the query string
    /// and, for non-GET JSON requests, from the body. It must deserialize as a
    /// struct (or `Box` of one).
    pub fn business<F, Fut, Req>(f: F) -> Handler
    where
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoReply,
        Req: DeserializeOwned + Serialize + Default + Send + 'static,
    {
        Handler::Business(TypedHandler {
            endpoint: Arc::new(BusinessFn {
                f: Arc::new(f),
                _request: PhantomData,
            }),
            request_type: std::any::type_name::<Req>(),
            probe: shape::probe::<Req>,
        })
    }
}

struct BusinessFn<F, Req> {
    f: Arc<F>,
    _request: PhantomData<fn(Req)>,
}

impl<F, Fut, Req> Endpoint for BusinessFn<F, Req>
where
    F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoReply,
    Req: DeserializeOwned + Serialize + Default + Send + 'static,
{
    fn call(&self, ctx: RequestContext, request: Request<Body>) -> BoxFuture<'static, Outcome> {
        let f = self.f.clone();

        Box::pin(async move {
            let bound = match bind_request::<Req>(request).await {
                Ok(bound) => bound,
                Err(e) => return Outcome::bad_request(e.to_string()),
            };

            let reply = f(ctx.clone(), bound).await.into_reply();
            render_reply(&ctx, reply)
        })
    }
}

/// Turn a reply into the envelope outcome.
fn render_reply<T: Serialize>(ctx: &RequestContext, reply: Reply<T>) -> Outcome {
    let data = match reply.data.map(serde_json::to_value).transpose() {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(
                trace_id = %ctx.trace_id(),
                error = %e,
                "business returned data that cannot be serialized"
            );
            return Outcome::invalid_error();
        }
    };

    let Some(error) = reply.error else {
        return Outcome::envelope(StatusCode::OK, Envelope::success(data));
    };

    match error.downcast::<BizError>() {
        Ok(biz) => Outcome::envelope(StatusCode::OK, biz.render(data)),
        Err(other) => {
            tracing::error!(
                trace_id = %ctx.trace_id(),
                url = %ctx.uri(),
                method = %ctx.method(),
                error = %other,
                "business returned an invalid error"
            );
            Outcome::invalid_error()
        }
    }
}
