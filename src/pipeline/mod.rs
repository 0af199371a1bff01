//! Per-request execution wrapper.
//!
//! # Data Flow
//! ```text
//! Start      fresh RequestContext (trace id, start time), not tied to the connection
//!   → Bound/Executed   handler chain runs on its own task
//!   → Responded        exactly one Outcome becomes the response
//!   ↘ Recovered        chain panicked: fixed server-fault envelope, HTTP 500,
//!                      message and backtrace logged
//!
//! Bookkeeping (always, once): proctime, stats_* pairs, metrics sink
//! ```
//!
//! # Design Decisions
//! - Chain, fault boundary and bookkeeping run in one spawned task: a
//!   dropped connection or a transport timeout cancels neither business
//!   logic nor its metrics
//! - HTTP status only distinguishes malformed input (400) and faults (500)
//!   from executed business outcomes (200)

pub mod context;
pub mod fault;
pub mod outcome;

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};

use crate::handler::bind::BindLimits;
use crate::handler::Chain;
use crate::observability::metrics::MetricsSink;

pub use context::{RequestContext, TraceId, TraceIds};
pub use fault::Fault;
pub use outcome::Outcome;

/// Shared per-server state used by every adapted route.
pub struct Pipeline {
    metrics: Arc<dyn MetricsSink>,
    traces: TraceIds,
    limits: BindLimits,
}

impl Pipeline {
    pub fn new(metrics: Arc<dyn MetricsSink>, limits: BindLimits) -> Self {
        fault::install_panic_hook();
        Self {
            metrics,
            traces: TraceIds::new(),
            limits,
        }
    }

    /// Run one request through `chain` and produce its only response.
    ///
    /// The chain, the fault boundary and bookkeeping share one spawned task,
    /// so they run to completion even when the caller is dropped by a
    /// timeout or a closed connection.
    pub async fn handle(self: &Arc<Self>, route: &str, chain: Chain, mut request: Request<Body>) -> Response {
        let ctx = RequestContext::new(
            self.traces.next(),
            request.method().clone(),
            request.uri().clone(),
        );
        request.extensions_mut().insert(self.limits);
        request.extensions_mut().insert(ctx.clone());

        tracing::debug!(
            target: "http.server.in",
            trace_id = %ctx.trace_id(),
            method = %ctx.method(),
            path = %ctx.uri().path(),
            "request starts"
        );

        let pipeline = self.clone();
        let route = route.to_string();
        let task = tokio::spawn(async move {
            let outcome = match fault::guard(chain.call(ctx.clone(), request)).await {
                Ok(outcome) => outcome,
                Err(fault) => pipeline.recover(&ctx, fault),
            };
            pipeline.finish(&ctx, &route, &outcome);
            outcome
        });

        match task.await {
            Ok(outcome) => outcome.into_response(),
            Err(join_error) => {
                tracing::error!(error = %join_error, "request task ended without an outcome");
                Outcome::server_fault().into_response()
            }
        }
    }

    fn recover(&self, ctx: &RequestContext, fault: Fault) -> Outcome {
        self.metrics.record_panic();

        tracing::error!(
            trace_id = %ctx.trace_id(),
            url = %ctx.uri(),
            method = %ctx.method(),
            error = %fault.message,
            backtrace = fault.backtrace.as_deref().unwrap_or("unavailable"),
            "caught a panic in request handler"
        );

        Outcome::server_fault()
    }

    fn finish(&self, ctx: &RequestContext, route: &str, outcome: &Outcome) {
        let proctime = ctx.elapsed();
        self.metrics
            .record_request(route, proctime, outcome.is_failure());

        let stats = ctx
            .stats()
            .into_iter()
            .map(|(key, value)| format!("stats_{}={}", key, value))
            .collect::<Vec<_>>()
            .join("||");

        tracing::debug!(
            target: "http.server.out",
            trace_id = %ctx.trace_id(),
            method = %ctx.method(),
            path = %ctx.uri().path(),
            route = %route,
            status = outcome.status().as_u16(),
            code = ?outcome.code(),
            proctime = proctime.as_secs_f64(),
            stats = %stats,
            "request ends"
        );
    }
}
