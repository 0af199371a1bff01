//! Handler normalization.
//!
//! # Data Flow
//! ```text
//! Handler::Raw        (tower service or fn(Request) -> impl IntoResponse)
//! Handler::Business   (fn(RequestContext, Req) -> impl IntoReply)
//! Handler::Middleware (fn(RequestContext, Request, Next) -> impl Into<Outcome>)
//!     → normalize_chain (shape checks, chain layout)
//!     → Chain { layers, endpoint }
//!     → Pipeline::handle at request time
//! ```
//!
//! # Design Decisions
//! - The variant is picked at the call site; context and error positions are
//!   enforced by the compiler
//! - The request type's serde shape is probed at registration, so a
//!   non-struct request type fails before serving traffic
//! - A chain is accepted whole or not at all

pub mod bind;
pub mod business;
pub mod middleware;
pub mod raw;
pub(crate) mod shape;

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::pipeline::{Outcome, RequestContext};

pub use business::{IntoReply, Reply, TypedHandler};
pub use middleware::{Middleware, Next};
pub use raw::RawHandler;

/// Terminal step of a chain.
pub(crate) trait Endpoint: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext, request: Request<Body>) -> BoxFuture<'static, Outcome>;
}

/// Pass-through step of a chain.
pub(crate) trait Layer: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext, request: Request<Body>, next: Next)
        -> BoxFuture<'static, Outcome>;
}

/// A unit of logic registered against a route.
#[derive(Clone)]
pub enum Handler {
    /// Operates on the transport request/response directly, no binding.
    Raw(RawHandler),
    /// Typed business function with query/JSON binding and envelope encoding.
    Business(TypedHandler),
    /// Runs before the terminal handler and decides whether to call it.
    Middleware(Middleware),
}

impl Handler {
    fn describe(&self) -> &'static str {
        match self {
            Handler::Raw(_) => "raw handler",
            Handler::Business(_) => "business handler",
            Handler::Middleware(_) => "middleware",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Business(typed) => f
                .debug_struct("Business")
                .field("request", &typed.request_type())
                .finish(),
            other => f.write_str(other.describe()),
        }
    }
}

/// A handler set that does not satisfy the registration contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("handler {index}: request type `{type_name}` must be a struct, found {found}")]
    RequestShape {
        index: usize,
        type_name: &'static str,
        found: &'static str,
    },

    #[error("handler chain is empty")]
    EmptyChain,

    #[error("handler {index}: {kind} must be the last handler in its chain")]
    TerminalNotLast { index: usize, kind: &'static str },

    #[error("handler chain must end with a raw or business handler")]
    MissingTerminal,

    #[error("group handler {index}: {kind} cannot be used as group middleware")]
    GroupHandler { index: usize, kind: &'static str },
}

/// A normalized handler, ready to be placed in a chain.
#[derive(Clone)]
pub(crate) enum Adapted {
    Endpoint(Arc<dyn Endpoint>),
    Layer(Arc<dyn Layer>),
}

/// Normalize a single handler. `index` is its position in the enclosing chain.
pub(crate) fn normalize(index: usize, handler: &Handler) -> Result<Adapted, ContractError> {
    match handler {
        Handler::Raw(raw) => Ok(Adapted::Endpoint(raw.endpoint())),
        Handler::Business(typed) => {
            typed.validate(index)?;
            Ok(Adapted::Endpoint(typed.endpoint()))
        }
        Handler::Middleware(middleware) => Ok(Adapted::Layer(middleware.layer())),
    }
}

/// Normalize a route's handlers: any number of middleware followed by one terminal handler.
pub fn normalize_chain(handlers: &[Handler]) -> Result<Chain, ContractError> {
    let (last, init) = handlers.split_last().ok_or(ContractError::EmptyChain)?;

    let mut layers = Vec::with_capacity(init.len());
    for (index, handler) in init.iter().enumerate() {
        match normalize(index, handler)? {
            Adapted::Layer(layer) => layers.push(layer),
            Adapted::Endpoint(_) => {
                return Err(ContractError::TerminalNotLast {
                    index,
                    kind: handler.describe(),
                })
            }
        }
    }

    match normalize(init.len(), last)? {
        Adapted::Endpoint(endpoint) => Ok(Chain {
            layers: layers.into(),
            endpoint,
        }),
        Adapted::Layer(_) => Err(ContractError::MissingTerminal),
    }
}

/// Normalize group-level handlers of a sub-router. All of them must be middleware.
pub(crate) fn normalize_group(handlers: &[Handler]) -> Result<Vec<Arc<dyn Layer>>, ContractError> {
    handlers
        .iter()
        .enumerate()
        .map(|(index, handler)| match normalize(index, handler)? {
            Adapted::Layer(layer) => Ok(layer),
            Adapted::Endpoint(_) => Err(ContractError::GroupHandler {
                index,
                kind: handler.describe(),
            }),
        })
        .collect()
}

/// A normalized handler chain.
#[derive(Clone)]
pub struct Chain {
    layers: Arc<[Arc<dyn Layer>]>,
    endpoint: Arc<dyn Endpoint>,
}

impl Chain {
    /// Prepend group middleware to this chain.
    pub(crate) fn with_group(self, group: &[Arc<dyn Layer>]) -> Self {
        if group.is_empty() {
            return self;
        }

        let layers: Vec<_> = group.iter().chain(self.layers.iter()).cloned().collect();
        Self {
            layers: layers.into(),
            endpoint: self.endpoint,
        }
    }

    /// Middleware count plus the terminal endpoint.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.layers.len() + 1
    }

    /// Run the chain for one request.
    pub fn call(&self, ctx: RequestContext, request: Request<Body>) -> BoxFuture<'static, Outcome> {
        let next = Next::new(ctx, self.layers.clone(), self.endpoint.clone());
        Box::pin(next.run(request))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::BizError;
    use axum::http::StatusCode;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Foo {
        foo: i64,
    }

    #[derive(Debug, Serialize)]
    struct Bar {
        bar: String,
    }

    async fn by_value(_ctx: RequestContext, _req: Foo) -> Result<Bar, BizError> {
        Ok(Bar { bar: "bar".into() })
    }

    async fn boxed(_ctx: RequestContext, _req: Box<Foo>) -> Result<Box<Bar>, BizError> {
        Ok(Box::new(Bar { bar: "bar".into() }))
    }

    async fn optional(_ctx: RequestContext, _req: Foo) -> Result<Option<Bar>, std::io::Error> {
        Ok(None)
    }

    async fn partial(_ctx: RequestContext, _req: Foo) -> Reply<Bar> {
        Reply::partial(Bar { bar: "half".into() }, BizError::new(1001, "partial"))
    }

    async fn map_request(_ctx: RequestContext, _req: HashMap<String, String>) -> Result<Bar, BizError> {
        Ok(Bar { bar: "map".into() })
    }

    async fn int_request(_ctx: RequestContext, _req: i64) -> Result<Bar, BizError> {
        Ok(Bar { bar: "never".into() })
    }

    async fn string_request(_ctx: RequestContext, _req: String) -> Result<Bar, BizError> {
        Ok(Bar { bar: "never".into() })
    }

    async fn seq_request(_ctx: RequestContext, _req: Vec<Foo>) -> Result<Bar, BizError> {
        Ok(Bar { bar: "never".into() })
    }

    async fn raw_fn(_req: Request<Body>) -> StatusCode {
        StatusCode::NO_CONTENT
    }

    async fn pass(ctx: RequestContext, req: Request<Body>, next: Next) -> Outcome {
        ctx.record("mw", 1);
        next.run(req).await
    }

    #[test]
    fn test_valid_handlers_normalize() {
        let handlers = vec![
            Handler::business(by_value),
            Handler::business(boxed),
            Handler::business(optional),
            Handler::business(partial),
            Handler::business(map_request),
            Handler::raw(raw_fn),
            Handler::service(tower::service_fn(|_req: Request<Body>| async {
                Ok::<_, std::convert::Infallible>(StatusCode::OK)
            })),
        ];

        for handler in &handlers {
            let chain = normalize_chain(std::slice::from_ref(handler));
            assert!(chain.is_ok(), "{:?} should normalize", handler);
        }
    }

    #[test]
    fn test_non_struct_requests_rejected() {
        for handler in [
            Handler::business(int_request),
            Handler::business(string_request),
            Handler::business(seq_request),
        ] {
            match normalize_chain(&[handler]) {
                Err(ContractError::RequestShape { index, .. }) => assert_eq!(index, 0),
                other => panic!("expected request shape error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_request_shape_error_names_type() {
        let err = normalize_chain(&[Handler::business(int_request)]).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("i64"), "{}", message);
        assert!(message.contains("handler 0"), "{}", message);
    }

    #[test]
    fn test_chain_layout() {
        assert_eq!(normalize_chain(&[]).err(), Some(ContractError::EmptyChain));

        assert_eq!(
            normalize_chain(&[Handler::middleware(pass)]).err(),
            Some(ContractError::MissingTerminal)
        );

        assert_eq!(
            normalize_chain(&[Handler::raw(raw_fn), Handler::business(by_value)]).err(),
            Some(ContractError::TerminalNotLast {
                index: 0,
                kind: "raw handler"
            })
        );

        let chain = normalize_chain(&[
            Handler::middleware(pass),
            Handler::middleware(pass),
            Handler::business(by_value),
        ])
        .unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_invalid_handler_anywhere_fails_whole_chain() {
        let err = normalize_chain(&[Handler::middleware(pass), Handler::business(int_request)]).err();
        assert!(matches!(err, Some(ContractError::RequestShape { index: 1, .. })));
    }

    #[test]
    fn test_group_handlers_must_be_middleware() {
        assert_eq!(normalize_group(&[Handler::middleware(pass)]).map(|l| l.len()), Ok(1));
        assert_eq!(
            normalize_group(&[Handler::middleware(pass), Handler::business(by_value)]).err(),
            Some(ContractError::GroupHandler {
                index: 1,
                kind: "business handler"
            })
        );
    }
}
