//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline::finish / recover
//!     → metrics.rs (MetricsSink: in-memory snapshot + `metrics` facade)
//!     → Prometheus exporter (optional scrape endpoint)
//!
//! TaskSampler (fixed interval)
//!     → MetricsSink::record_tasks
//!
//! Everything else
//!     → logging.rs (tracing subscriber, EnvFilter)
//! ```

pub mod logging;
pub mod metrics;
pub mod sampler;

pub use metrics::{MetricsSink, RouteStats, ServerMetrics};
pub use sampler::TaskSampler;
