//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http::Server::run):
//!     start hooks in order → sampler → accept loop
//!
//! Shutdown (shutdown.rs):
//!     signal resolved → stop accepting → drain (bounded) → stop sampler
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → resolve the serve signal
//! ```
//!
//! # Design Decisions
//! - Fail fast: a failing start hook aborts startup before traffic
//! - Shutdown has a timeout: draining stops after the deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
