//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → net::listener (hyper-util, HTTP/1.1 + HTTP/2)
//!     → server.rs Router (timeout and trace layers)
//!     → routing::RouteTable dispatch (ping, method lookup, 405)
//!     → pipeline::Pipeline (context, fault boundary, bookkeeping)
//!     → Send to client
//! ```

pub mod server;

pub use server::{Server, ServerError, StartHook};
