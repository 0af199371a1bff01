//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route / RouteList / RouteMap   (declarations)
//!     → Routes::register(&mut dyn Router)
//!     → RouteTable / Group       (normalize chains, join paths, reject duplicates)
//!     → RouteTable::into_axum    (one axum route per path, dispatch by method)
//! ```
//!
//! # Design Decisions
//! - Registration is complete before serving; the table is immutable afterwards
//! - A binding is accepted whole or not at all
//! - A route list is not transactional: bindings before a failure stay bound
//! - Explicit methods win over `ANY` at the same path

pub mod method;
pub mod route;
pub mod router;
pub mod table;

pub use method::Method;
pub use route::{route, Route, RouteList, RouteMap, Routes};
pub use router::Router;
pub use table::{join_paths, Group, RouteError, RouteTable};
