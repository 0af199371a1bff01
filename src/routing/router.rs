//! The registration interface route declarations target.

use super::{Method, RouteError};
use crate::handler::Handler;

/// Something route declarations can be registered against.
///
/// Every handler set passed in is normalized first. A set that fails
/// normalization leaves the router unchanged.
pub trait Router {
    /// A router whose paths are relative to `prefix`, running `middlewares`
    /// ahead of every chain bound through it.
    fn sub_router(
        &mut self,
        prefix: &str,
        middlewares: &[Handler],
    ) -> Result<Box<dyn Router + '_>, RouteError>;

    /// Bind `handlers` to `method` at `uri`. The wildcard delegates to [`Router::bind_any`].
    fn bind(&mut self, method: Method, uri: &str, handlers: &[Handler]) -> Result<(), RouteError>;

    /// Bind `handlers` to every method at `uri` that has no explicit binding.
    fn bind_any(&mut self, uri: &str, handlers: &[Handler]) -> Result<(), RouteError>;
}
