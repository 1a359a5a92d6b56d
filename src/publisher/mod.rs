//! Periodic heartbeat and metrics publication.

mod error;
mod heartbeat;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::alert::AlertQueue;
use crate::registry::Registry;
use crate::runtime::Runtime;
use crate::sampler::{self, MetricPoint, SampleError};
use crate::shutdown;

pub use error::{Error, Result};
pub use heartbeat::{HeartbeatStore, RedisHeartbeat, heartbeat_key};
pub use sink::{HttpMetricsSink, MetricsBatch, MetricsSink, SCHEMA_VERSION};

/// What happened during one publish cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub heartbeat_ok: bool,
    /// Containers included in the batch.
    pub sampled: usize,
    /// Containers dropped from the registry because they were removed or stopped.
    pub vanished: usize,
    /// Containers whose sampling failed for any other reason.
    pub failed: usize,
    pub batch_sent: bool,
}

/// Writes the heartbeat and publishes one metric batch per interval.
pub struct Publisher<R, H, M> {
    runtime: Arc<R>,
    heartbeat: H,
    sink: M,
    registry: Arc<Registry>,
    alerts: Arc<AlertQueue>,
    host_id: String,
    interval: Duration,
}

impl<R, H, M> Publisher<R, H, M>
where
    R: Runtime,
    H: HeartbeatStore,
    M: MetricsSink,
{
    pub fn new(
        runtime: Arc<R>,
        heartbeat: H,
        sink: M,
        registry: Arc<Registry>,
        alerts: Arc<AlertQueue>,
        host_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            runtime,
            heartbeat,
            sink,
            registry,
            alerts,
            host_id: host_id.into(),
            interval,
        }
    }

    async fn send_heartbeat(&self) -> bool {
        match self.heartbeat.beat(&self.host_id, self.interval * 2).await {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to write heartbeat: host_id={}, error={}", self.host_id, err);
                self.alerts.push(format!("Heartbeat failure: {err}"));
                false
            }
        }
    }

    /// Samples every tracked container concurrently and returns the points
    /// sorted by container id.
    async fn sample_all(&self, report: &mut CycleReport) -> Vec<MetricPoint> {
        let mut tasks = JoinSet::new();
        for container_id in self.registry.snapshot() {
            let runtime = Arc::clone(&self.runtime);
            tasks.spawn(async move {
                let result = sampler::sample(runtime.as_ref(), &container_id).await;
                (container_id, result)
            });
        }

        let mut points = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (container_id, result) = match joined {
                Ok(out) => out,
                Err(err) => {
                    log::error!("sampling task failed: {}", err);
                    report.failed += 1;
                    continue;
                }
            };
            match result {
                Ok(point) => points.push(point),
                Err(SampleError::Vanished(_)) => {
                    log::debug!(
                        "container vanished before sampling, untracking: container_id={}",
                        container_id
                    );
                    self.registry.remove(&container_id);
                    report.vanished += 1;
                }
                Err(err) => {
                    log::warn!("Metrics error for {}: {}", container_id, err);
                    self.alerts
                        .push(format!("Metrics failure for {container_id}: {err}"));
                    report.failed += 1;
                }
            }
        }
        points.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        report.sampled = points.len();
        points
    }

    /// Runs one heartbeat + sample + send cycle. Failures become alerts.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport {
            heartbeat_ok: self.send_heartbeat().await,
            ..CycleReport::default()
        };

        let timestamp = Utc::now();
        let containers = self.sample_all(&mut report).await;
        let batch = MetricsBatch {
            host_id: self.host_id.clone(),
            timestamp,
            containers,
            schema_version: SCHEMA_VERSION,
        };

        match self.sink.send(&batch).await {
            Ok(()) => {
                log::info!(
                    "metrics sent: count={}, timestamp={}",
                    batch.containers.len(),
                    timestamp.to_rfc3339()
                );
                report.batch_sent = true;
            }
            Err(err) => {
                log::error!("Failed to send metrics: {}", err);
                self.alerts.push(format!("Metrics POST failure: {err}"));
            }
        }

        report
    }

    /// Runs a cycle immediately and then once per interval until shutdown.
    pub async fn run(self, mut shutdown: shutdown::Signal) {
        log::info!(
            "Metrics publisher started: host_id={}, interval={:?}",
            self.host_id,
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    log::debug!("publish cycle finished: {:?}", report);
                }
                _ = shutdown.recv() => {
                    log::debug!("Metrics publisher received shutdown signal");
                    break;
                }
            }
        }
        log::info!("Metrics publisher stopped");
    }
}
