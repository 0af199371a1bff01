//! Business error envelope and the uniform response body.
//!
//! # Data Flow
//! ```text
//! business logic
//!     → BizError (code, message, causes)   or plain success data
//!     → render(data)
//!     → Envelope { err, now, msg?, data? }
//!     → JSON body
//! ```
//!
//! # Design Decisions
//! - Code 0 means success, even when carried by a `BizError`
//! - Causes are flattened into the message, never serialized structurally
//! - `now` is always stamped, RFC 3339 with second precision

pub mod codes;
pub mod error;
pub mod response;

pub use error::{BizError, BoxError};
pub use response::Envelope;
