//! Failure alerts: the shared queue, its digest format and the batcher that
//! flushes it.

mod batcher;
mod digest;
mod error;
mod sink;

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

pub use batcher::{AlertBatcher, FlushOutcome};
pub use digest::{DigestPart, Embed, EmbedField, Message, build_digest};
pub use error::{Error, Result};
pub use sink::{AlertSink, DiscordWebhook};

/// Alerts taken out of the queue in one atomic drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingAlerts {
    pub alerts: Vec<String>,
    /// Alerts discarded by the capacity bound since the last drain.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    alerts: VecDeque<String>,
    dropped: u64,
}

impl QueueState {
    fn enforce_capacity(&mut self, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.alerts.len() > capacity {
            self.alerts.pop_front();
            self.dropped += 1;
        }
    }
}

/// Ordered queue of human-readable failure strings.
///
/// Push, drain and restore each take the lock once, so a drain can never
/// observe half of a concurrent push and no alert is delivered twice.
/// A non-zero capacity drops the oldest entries when exceeded.
#[derive(Debug, Default)]
pub struct AlertQueue {
    state: Mutex<QueueState>,
    capacity: usize,
}

impl AlertQueue {
    /// `capacity == 0` means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::default(),
            capacity,
        }
    }

    pub fn push(&self, alert: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.alerts.push_back(alert.into());
        let before = state.dropped;
        state.enforce_capacity(self.capacity);
        if state.dropped > before {
            log::warn!(
                "alert queue full (capacity={}), dropped oldest alert",
                self.capacity
            );
        }
    }

    /// Takes every queued alert and resets the drop counter.
    pub fn drain(&self) -> PendingAlerts {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        PendingAlerts {
            alerts: state.alerts.drain(..).collect(),
            dropped: std::mem::take(&mut state.dropped),
        }
    }

    /// Puts undelivered alerts back in front of anything pushed since the drain.
    pub fn restore(&self, pending: PendingAlerts) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for alert in pending.alerts.into_iter().rev() {
            state.alerts.push_front(alert);
        }
        state.dropped += pending.dropped;
        state.enforce_capacity(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .alerts
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the queued alerts without removing them.
    #[cfg(test)]
    pub fn peek(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .alerts
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_drain_takes_everything_in_order() {
        let queue = AlertQueue::default();
        queue.push("a");
        queue.push("b");
        let pending = queue.drain();
        assert_eq!(pending.alerts, vec!["a", "b"]);
        assert_eq!(pending.dropped, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_restore_goes_before_newer_alerts() {
        let queue = AlertQueue::default();
        queue.push("a");
        queue.push("b");
        let pending = queue.drain();
        queue.push("c");
        queue.restore(pending);
        assert_eq!(queue.peek(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let queue = AlertQueue::with_capacity(2);
        queue.push("a");
        queue.push("b");
        queue.push("c");
        assert_eq!(queue.peek(), vec!["b", "c"]);
        let pending = queue.drain();
        assert_eq!(pending.dropped, 1);
        assert_eq!(queue.drain().dropped, 0);
    }

    #[test]
    fn test_restore_respects_capacity_and_keeps_drop_count() {
        let queue = AlertQueue::with_capacity(3);
        queue.push("a");
        queue.push("b");
        let pending = queue.drain();
        queue.push("c");
        queue.push("d");
        queue.restore(pending);
        assert_eq!(queue.peek(), vec!["b", "c", "d"]);
        assert_eq!(queue.drain().dropped, 1);
    }

    #[test]
    fn test_unbounded_queue_never_drops() {
        let queue = AlertQueue::with_capacity(0);
        for i in 0..10_000 {
            queue.push(format!("alert {i}"));
        }
        let pending = queue.drain();
        assert_eq!(pending.alerts.len(), 10_000);
        assert_eq!(pending.dropped, 0);
    }

    #[test]
    fn test_concurrent_push_and_drain_lose_and_duplicate_nothing() {
        let queue = Arc::new(AlertQueue::default());
        let producers: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        queue.push(format!("{t}-{i}"));
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while producers.iter().any(|p| !p.is_finished()) {
            seen.extend(queue.drain().alerts);
        }
        for producer in producers {
            producer.join().unwrap();
        }
        seen.extend(queue.drain().alerts);

        let unique: HashSet<&String> = seen.iter().collect();
        assert_eq!(seen.len(), 4_000);
        assert_eq!(unique.len(), 4_000);
    }
}
