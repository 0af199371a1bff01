//! Reserved envelope codes.
//!
//! Business code spaces should start above [`SERVER_PANIC`].

/// The request succeeded.
pub const OK: i64 = 0;

/// The query string or body could not be bound to the request type.
pub const BAD_REQUEST: i64 = 1;

/// Business logic returned an error that is not a [`BizError`](super::BizError).
pub const INVALID_ERROR: i64 = 2;

/// Business logic panicked and the fault boundary recovered it.
pub const SERVER_PANIC: i64 = 3;
