//! Declarative route tables.

use std::collections::HashMap;

use super::{Method, RouteError, Router};
use crate::handler::Handler;

/// Anything that can register itself against a [`Router`].
pub trait Routes: Send + Sync {
    fn register(&self, router: &mut dyn Router) -> Result<(), RouteError>;
}

/// A single binding.
#[derive(Debug, Clone)]
pub struct Route {
    pub uri: String,
    pub method: Method,
    pub handlers: Vec<Handler>,
}

/// Shorthand for [`Route`].
pub fn route(uri: impl Into<String>, method: Method, handlers: Vec<Handler>) -> Route {
    Route {
        uri: uri.into(),
        method,
        handlers,
    }
}

impl Routes for Route {
    fn register(&self, router: &mut dyn Router) -> Result<(), RouteError> {
        match self.method {
            Method::Any => router.bind_any(&self.uri, &self.handlers),
            method => router.bind(method, &self.uri, &self.handlers),
        }
    }
}

/// Routes registered in declaration order.
///
/// Registration stops at the first failure. Routes registered before it
/// stay registered.
#[derive(Debug, Clone, Default)]
pub struct RouteList(pub Vec<Route>);

impl RouteList {
    pub fn new(routes: Vec<Route>) -> Self {
        Self(routes)
    }
}

impl Routes for RouteList {
    fn register(&self, router: &mut dyn Router) -> Result<(), RouteError> {
        self.0.iter().try_for_each(|route| route.register(router))
    }
}

/// Nested routes keyed by path prefix. Each prefix becomes a sub-router.
///
/// Iteration order is unspecified, so prefixes must not collide.
#[derive(Default)]
pub struct RouteMap(pub HashMap<String, Box<dyn Routes>>);

impl RouteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, routes: impl Routes + 'static) -> Self {
        self.0.insert(prefix.into(), Box::new(routes));
        self
    }
}

impl Routes for RouteMap {
    fn register(&self, router: &mut dyn Router) -> Result<(), RouteError> {
        for (prefix, routes) in &self.0 {
            let mut sub = router.sub_router(prefix, &[])?;
            routes.register(sub.as_mut())?;
        }

        Ok(())
    }
}
