//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, hyper-util auto builder)
//!     → connection.rs (id, live-connection tracking)
//!     → axum::Router (one service clone per connection)
//!
//! Shutdown:
//!     stop accepting → graceful drain → timeout
//! ```

pub mod connection;
pub mod listener;

pub use listener::{bind, serve, ConnectionSettings, ListenerError};
