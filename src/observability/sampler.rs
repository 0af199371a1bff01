//! Periodic sampling of live runtime tasks, plus the once-a-second roll of
//! per-route request windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::metrics::MetricsSink;

const WINDOW: Duration = Duration::from_secs(1);

pub struct TaskSampler {
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
}

impl TaskSampler {
    pub fn new(metrics: Arc<dyn MetricsSink>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    /// Spawn the sampling loop. It exits once `shutdown` fires or its sender is dropped.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(interval_secs = self.interval.as_secs(), "task sampler starting");

        let mut ticker = time::interval(self.interval);
        let mut windows = time::interval(WINDOW);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let tasks = Handle::current().metrics().num_alive_tasks();
                    self.metrics.record_tasks(tasks);
                }
                _ = windows.tick() => self.metrics.roll_windows(),
                _ = shutdown.recv() => {
                    tracing::debug!("task sampler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::observability::metrics::ServerMetrics;

    #[tokio::test]
    async fn test_samples_then_stops() {
        let metrics = Arc::new(ServerMetrics::new());
        let shutdown = Shutdown::new();

        let handle = TaskSampler::new(metrics.clone(), Duration::from_millis(10))
            .spawn(shutdown.subscribe());

        // The first tick fires immediately and sees at least the sampler itself.
        time::sleep(Duration::from_millis(50)).await;
        assert!(metrics.tasks() >= 1);

        shutdown.trigger();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
