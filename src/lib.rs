//! Envelope HTTP: typed business handlers behind a uniform JSON envelope.
//!
//! # Architecture Overview
//!
//! ```text
//!   RouteMap / RouteList / Route ──register──▶ RouteTable (normalized chains)
//!                                                   │
//!                                                   ▼ into_axum
//!   TCP ──▶ net::listener ──▶ axum::Router ──▶ Pipeline::handle
//!                                                   │
//!                                  ┌────────────────┼──────────────────┐
//!                                  ▼                ▼                  ▼
//!                            middleware      business handler     raw handler
//!                                              (bind → call)
//!                                                   │
//!                                                   ▼
//!                                   Envelope {err, now, msg?, data?}
//!
//!   Cross-cutting: config, observability (metrics, sampler, logging), lifecycle
//! ```

// Core
pub mod envelope;
pub mod handler;
pub mod pipeline;
pub mod routing;

// Serving
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use envelope::{codes, BizError, BoxError, Envelope};
pub use handler::{ContractError, Handler, IntoReply, Next, Reply};
pub use http::{Server, ServerError};
pub use lifecycle::Shutdown;
pub use pipeline::{Outcome, RequestContext};
pub use routing::{route, Method, Route, RouteError, RouteList, RouteMap, Router, Routes};
