use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use super::{AlertQueue, AlertSink, PendingAlerts, build_digest};
use crate::shutdown;

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued or no sink is configured.
    Skipped,
    Sent { alerts: usize },
    /// Delivery stopped at a failed message; `restored` alerts went back to the queue.
    Failed { sent: usize, restored: usize },
}

/// Periodically folds the queued alerts into one digest and delivers it.
pub struct AlertBatcher<S> {
    queue: Arc<AlertQueue>,
    sink: Option<S>,
    host_id: String,
    interval: Duration,
}

impl<S: AlertSink> AlertBatcher<S> {
    /// A batcher without sink never drains the queue.
    pub fn new(
        queue: Arc<AlertQueue>,
        sink: Option<S>,
        host_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            sink,
            host_id: host_id.into(),
            interval,
        }
    }

    /// Drains the queue and sends it as one digest.
    ///
    /// Alerts that could not be delivered are put back in front of the queue,
    /// ahead of anything pushed while the flush was in flight.
    pub async fn flush(&self) -> FlushOutcome {
        let Some(sink) = &self.sink else {
            return FlushOutcome::Skipped;
        };
        if self.queue.is_empty() {
            return FlushOutcome::Skipped;
        }

        let pending = self.queue.drain();
        if pending.alerts.is_empty() {
            return FlushOutcome::Skipped;
        }
        let total = pending.alerts.len();
        let mut sent = 0;
        for part in build_digest(&self.host_id, &pending) {
            if let Err(err) = sink.send(&part.message).await {
                log::error!(
                    "failed to send alert digest: host_id={}, delivered={}, pending={}, error={}",
                    self.host_id,
                    sent,
                    total - sent,
                    err
                );
                let restored = total - sent;
                self.queue.restore(PendingAlerts {
                    // The drop notice travels with the first message only.
                    dropped: if sent == 0 { pending.dropped } else { 0 },
                    alerts: pending.alerts.into_iter().skip(sent).collect(),
                });
                return FlushOutcome::Failed { sent, restored };
            }
            sent += part.alerts;
        }

        log::info!("Sent {} alerts to the alert sink.", sent);
        FlushOutcome::Sent { alerts: sent }
    }

    /// Flushes every interval until shutdown, starting one interval after the call.
    pub async fn run(self, mut shutdown: shutdown::Signal) {
        log::info!(
            "Alert batcher started: interval={:?}, sink_configured={}",
            self.interval,
            self.sink.is_some()
        );
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                _ = shutdown.recv() => {
                    log::debug!("Alert batcher received shutdown signal");
                    break;
                }
            }
        }

        if let FlushOutcome::Failed { restored, .. } = self.flush().await {
            log::warn!("{} alerts undelivered at shutdown", restored);
        }
        log::info!("Alert batcher stopped");
    }
}
