//! Request-scoped context handed to business logic.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::http::{Method, Uri};

/// Identifier of one in-flight request.
///
/// Derived from the wall clock in nanoseconds and forced strictly increasing
/// by [`TraceIds`], so two requests never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceId(u64);

impl TraceId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trace id generator owned by one server instance.
#[derive(Debug, Default)]
pub struct TraceIds {
    last: AtomicU64,
}

impl TraceIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next trace id: the current clock reading, bumped past the previous id if needed.
    pub fn next(&self) -> TraceId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let bump = |last: u64| now.max(last + 1);

        let previous = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(bump(last)))
        {
            Ok(previous) | Err(previous) => previous,
        };

        TraceId(bump(previous))
    }
}

/// Context owned by one request.
///
/// Cloning is cheap and every clone shares the same instrumentation
/// accumulator. Pairs recorded here are logged with a `stats_` prefix once
/// the response has been produced.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    trace_id: TraceId,
    started_at: Instant,
    method: Method,
    uri: Uri,
    stats: Mutex<Vec<(String, String)>>,
}

impl RequestContext {
    /// Create a fresh context. The start timestamp is captured now.
    pub fn new(trace_id: TraceId, method: Method, uri: Uri) -> Self {
        Self {
            inner: Arc::new(Inner {
                trace_id,
                started_at: Instant::now(),
                method,
                uri,
                stats: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn trace_id(&self) -> TraceId {
        self.inner.trace_id
    }

    pub fn started_at(&self) -> Instant {
        self.inner.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// Record an instrumentation pair for this request.
    pub fn record(&self, key: impl Into<String>, value: impl ToString) {
        let mut stats = self
            .inner
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.push((key.into(), value.to_string()));
    }

    /// Recorded pairs, in insertion order.
    pub fn stats(&self) -> Vec<(String, String)> {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
