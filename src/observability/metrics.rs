//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_count` (counter): requests by route
//! - `api_failure` (counter): requests by route whose outcome was a failure
//! - `api_qps` (gauge): requests by route in the last full second
//! - `api_proc_time_seconds` (histogram): processing time by route
//! - `api_max_proc_time_seconds` (gauge): slowest request by route
//! - `server_tasks` (gauge): live runtime tasks, sampled periodically
//! - `server_panic` (counter): recovered faults
//!
//! # Design Decisions
//! - Emission goes through the `metrics` facade; without an installed
//!   recorder it is a no-op
//! - An exact in-memory snapshot is kept alongside, so counts can be read
//!   back without a scrape
//! - Labelled by route pattern, not by raw path
//! - `api_qps` is refreshed by requests and by [`MetricsSink::roll_windows`],
//!   so an idle route drops to zero instead of holding its last value

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

/// Histogram buckets for processing time (in seconds).
const PROC_TIME_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Where the request pipeline reports.
pub trait MetricsSink: Send + Sync + 'static {
    fn record_request(&self, route: &str, proctime: Duration, failed: bool);
    fn record_panic(&self);
    fn record_tasks(&self, tasks: usize);
    /// Close every one-second window that has run out.
    fn roll_windows(&self);
}

/// Snapshot of one route's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteStats {
    pub count: u64,
    pub failure: u64,
    pub total_proc_time: Duration,
    pub max_proc_time: Duration,
    /// Requests seen in the current one-second window.
    pub window_count: u64,
    /// Requests in the last closed window.
    pub qps: u64,
}

impl RouteStats {
    pub fn avg_proc_time(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_proc_time.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[derive(Debug)]
struct RouteEntry {
    stats: RouteStats,
    window_start: Instant,
}

impl RouteEntry {
    /// Close the window if a second has passed, returning its rate. A window
    /// left open for two seconds or more had an idle second, so it rates zero.
    fn roll(&mut self, now: Instant) -> Option<u64> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let qps = if elapsed < Duration::from_secs(2) {
            self.stats.window_count
        } else {
            0
        };
        self.stats.qps = qps;
        self.stats.window_count = 0;
        self.window_start = now;
        Some(qps)
    }
}

/// Metrics handles owned by one server instance.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    routes: DashMap<String, RouteEntry>,
    panics: AtomicU64,
    tasks: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_stats(&self, route: &str) -> Option<RouteStats> {
        self.routes.get(route).map(|entry| entry.stats)
    }

    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    /// Last sampled task count.
    pub fn tasks(&self) -> u64 {
        self.tasks.load(Ordering::Relaxed)
    }

    pub(crate) fn roll_windows_at(&self, now: Instant) {
        for mut entry in self.routes.iter_mut() {
            if let Some(qps) = entry.value_mut().roll(now) {
                gauge!("api_qps", "route" => entry.key().clone()).set(qps as f64);
            }
        }
    }
}

impl MetricsSink for ServerMetrics {
    fn record_request(&self, route: &str, proctime: Duration, failed: bool) {
        let now = Instant::now();
        let (max, completed_window) = {
            let mut entry = self
                .routes
                .entry(route.to_string())
                .or_insert_with(|| RouteEntry {
                    stats: RouteStats::default(),
                    window_start: now,
                });

            let completed_window = entry.roll(now);

            let stats = &mut entry.stats;
            stats.count += 1;
            stats.window_count += 1;
            stats.total_proc_time += proctime;
            if failed {
                stats.failure += 1;
            }
            if proctime > stats.max_proc_time {
                stats.max_proc_time = proctime;
            }

            (stats.max_proc_time, completed_window)
        };

        let label = route.to_string();
        counter!("api_count", "route" => label.clone()).increment(1);
        if failed {
            counter!("api_failure", "route" => label.clone()).increment(1);
        }
        histogram!("api_proc_time_seconds", "route" => label.clone()).record(proctime.as_secs_f64());
        gauge!("api_max_proc_time_seconds", "route" => label.clone()).set(max.as_secs_f64());
        if let Some(qps) = completed_window {
            gauge!("api_qps", "route" => label).set(qps as f64);
        }
    }

    fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
        counter!("server_panic").increment(1);
    }

    fn record_tasks(&self, tasks: usize) {
        self.tasks.store(tasks as u64, Ordering::Relaxed);
        gauge!("server_tasks").set(tasks as f64);
    }

    fn roll_windows(&self) {
        self.roll_windows_at(Instant::now());
    }
}

/// Install the Prometheus recorder and serve scrapes on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("api_proc_time_seconds".to_string()),
            PROC_TIME_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "metrics exporter listening");
    Ok(())
}
