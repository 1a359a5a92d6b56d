use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::Backoff;
use crate::registry::Registry;
use crate::runtime::{ContainerEvent, EventAction, EventStream, Runtime};
use crate::shutdown;

/// Applies one lifecycle event to the registry.
pub fn process_event(registry: &Registry, event: &ContainerEvent) {
    match &event.action {
        EventAction::Start => {
            registry.insert(
                event.container_id.clone(),
                event.container_name.clone(),
                event.timestamp,
            );
            log::info!(
                "container started: container_id={}, container_name={}, timestamp={}",
                event.container_id,
                event.container_name,
                event.timestamp.to_rfc3339()
            );
        }
        EventAction::Die => {
            let tracked = registry.remove(&event.container_id);
            log::info!(
                "container died: container_id={}, container_name={}, exit_code={}, timestamp={}, tracked={}",
                event.container_id,
                event.container_name,
                event.exit_code,
                event.timestamp.to_rfc3339(),
                tracked
            );
        }
        EventAction::Other(action) => {
            log::trace!(
                "ignoring container event: action={}, container_id={}",
                action,
                event.container_id
            );
        }
    }
}

/// Follows the runtime's event stream and mirrors container membership into
/// the registry.
pub struct Listener<R> {
    runtime: Arc<R>,
    registry: Arc<Registry>,
    reconnect: bool,
    backoff: Backoff,
    /// Where a resubscription picks up: the last processed event, or the
    /// moment of the first subscription if no event arrived yet.
    resume_from: Option<DateTime<Utc>>,
}

impl<R: Runtime> Listener<R> {
    pub fn new(runtime: Arc<R>, registry: Arc<Registry>, reconnect: bool) -> Self {
        Self {
            runtime,
            registry,
            reconnect,
            backoff: Backoff::default(),
            resume_from: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Consumes events until shutdown, or until the stream fails while
    /// reconnecting is disabled.
    pub async fn run(mut self, mut shutdown: shutdown::Signal) {
        log::info!("Event listener started: reconnect={}", self.reconnect);

        'subscribe: loop {
            let requested_at = Utc::now();
            let subscription = tokio::select! {
                subscription = self.runtime.subscribe(self.resume_from) => subscription,
                _ = shutdown.recv() => break 'subscribe,
            };

            match subscription {
                Ok(mut events) => {
                    log::debug!(
                        "Subscribed to container events: since={:?}",
                        self.resume_from
                    );
                    self.resume_from.get_or_insert(requested_at);
                    loop {
                        let next = tokio::select! {
                            next = events.next_event() => next,
                            _ = shutdown.recv() => break 'subscribe,
                        };
                        match next {
                            Ok(Some(event)) => {
                                self.backoff.reset();
                                process_event(&self.registry, &event);
                                self.resume_from = Some(event.timestamp);
                            }
                            Ok(None) => {
                                log::error!("container event stream closed by the runtime");
                                break;
                            }
                            Err(err) => {
                                log::error!("container event stream failed: {}", err);
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    log::error!("failed to subscribe to container events: {}", err);
                }
            }

            if !self.reconnect {
                log::warn!(
                    "Event listener stopped without reconnect, tracked containers are frozen: tracked={}",
                    self.registry.size()
                );
                return;
            }

            let delay = self.backoff.next_delay();
            log::info!("Resubscribing to container events in {:?}", delay);
            if !sleep_or_shutdown(delay, &mut shutdown).await {
                break;
            }
        }

        log::info!("Event listener stopped");
    }
}

/// Returns false if shutdown interrupted the sleep.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut shutdown::Signal) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.recv() => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::container::ContainerID;
    use crate::runtime::{self, StatsSnapshot};

    fn event(action: &str, id: &str, secs: i64) -> ContainerEvent {
        ContainerEvent {
            action: EventAction::from(action),
            container_id: ContainerID::new(id).unwrap(),
            container_name: format!("{id}-name"),
            exit_code: if action == "die" { "0".to_owned() } else { String::new() },
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        }
    }

    fn stream_error() -> runtime::Error {
        runtime::Error::Status {
            path: "/events".to_owned(),
            status: 500,
            body: "daemon restarting".to_owned(),
        }
    }

    /// Scripted event stream; once the script is exhausted it either ends or
    /// waits forever.
    struct ScriptedEvents {
        items: VecDeque<runtime::Result<ContainerEvent>>,
        hang: bool,
    }

    impl EventStream for ScriptedEvents {
        async fn next_event(&mut self) -> runtime::Result<Option<ContainerEvent>> {
            match self.items.pop_front() {
                Some(Ok(event)) => Ok(Some(event)),
                Some(Err(err)) => Err(err),
                None if self.hang => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    enum Subscription {
        Refused,
        Ends(Vec<runtime::Result<ContainerEvent>>),
        Hangs(Vec<runtime::Result<ContainerEvent>>),
    }

    #[derive(Default)]
    struct ScriptedRuntime {
        subscriptions: Mutex<VecDeque<Subscription>>,
        subscribed: AtomicUsize,
        since: Mutex<Vec<Option<DateTime<Utc>>>>,
    }

    impl ScriptedRuntime {
        fn new(subscriptions: Vec<Subscription>) -> Arc<Self> {
            Arc::new(Self {
                subscriptions: Mutex::new(subscriptions.into()),
                subscribed: AtomicUsize::new(0),
                since: Mutex::default(),
            })
        }

        fn subscribed(&self) -> usize {
            self.subscribed.load(Ordering::SeqCst)
        }

        fn since(&self) -> Vec<Option<i64>> {
            self.since
                .lock()
                .unwrap()
                .iter()
                .map(|since| since.map(|ts| ts.timestamp()))
                .collect()
        }
    }

    impl Runtime for ScriptedRuntime {
        type Events = ScriptedEvents;

        async fn subscribe(
            &self,
            since: Option<DateTime<Utc>>,
        ) -> runtime::Result<ScriptedEvents> {
            self.subscribed.fetch_add(1, Ordering::SeqCst);
            self.since.lock().unwrap().push(since);
            let next = self.subscriptions.lock().unwrap().pop_front();
            match next {
                Some(Subscription::Refused) => Err(stream_error()),
                Some(Subscription::Ends(items)) => Ok(ScriptedEvents {
                    items: items.into(),
                    hang: false,
                }),
                Some(Subscription::Hangs(items)) => Ok(ScriptedEvents {
                    items: items.into(),
                    hang: true,
                }),
                None => Ok(ScriptedEvents {
                    items: VecDeque::new(),
                    hang: true,
                }),
            }
        }

        async fn stats(&self, container_id: &ContainerID) -> runtime::Result<StatsSnapshot> {
            Err(runtime::Error::NotFound(container_id.clone()))
        }
    }

    fn ids(registry: &Registry) -> Vec<String> {
        registry
            .snapshot()
            .iter()
            .map(|id| id.as_str().to_owned())
            .collect()
    }

    #[test]
    fn test_process_event_start_and_die() {
        let registry = Registry::default();
        process_event(&registry, &event("start", "a", 0));
        process_event(&registry, &event("start", "b", 1));
        process_event(&registry, &event("die", "a", 10));
        assert_eq!(ids(&registry), vec!["b"]);

        let entry = &registry.entries()[0];
        assert_eq!(entry.container_name, "b-name");
        assert_eq!(entry.started_at.timestamp(), 1);
    }

    #[test]
    fn test_die_for_untracked_container_is_noop() {
        let registry = Registry::default();
        process_event(&registry, &event("die", "ghost", 0));
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn test_other_actions_are_ignored() {
        let registry = Registry::default();
        process_event(&registry, &event("pause", "a", 0));
        process_event(&registry, &event("health_status: healthy", "a", 0));
        assert_eq!(registry.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_events_in_order() {
        let runtime = ScriptedRuntime::new(vec![Subscription::Hangs(vec![
            Ok(event("start", "a", 0)),
            Ok(event("start", "b", 1)),
            Ok(event("die", "a", 10)),
            Ok(event("start", "a", 11)),
            Ok(event("die", "b", 12)),
        ])]);
        let registry = Arc::new(Registry::default());
        let (trigger, signal) = shutdown::channel();
        let listener = Listener::new(Arc::clone(&runtime), Arc::clone(&registry), true);
        let handle = tokio::spawn(listener.run(signal));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ids(&registry), vec!["a"]);
        assert_eq!(runtime.subscribed(), 1);

        trigger.fire();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_resubscribes_after_stream_ends() {
        let runtime = ScriptedRuntime::new(vec![
            Subscription::Ends(vec![Ok(event("start", "a", 0)), Ok(event("start", "b", 1))]),
            Subscription::Hangs(vec![Ok(event("die", "b", 5))]),
        ]);
        let registry = Arc::new(Registry::default());
        let (trigger, signal) = shutdown::channel();
        let listener = Listener::new(Arc::clone(&runtime), Arc::clone(&registry), true);
        let handle = tokio::spawn(listener.run(signal));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ids(&registry), vec!["a", "b"]);
        assert_eq!(runtime.subscribed(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(runtime.subscribed(), 2);
        assert_eq!(ids(&registry), vec!["a"]);

        trigger.fire();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscriptions_back_off_exponentially() {
        let runtime = ScriptedRuntime::new(vec![
            Subscription::Refused,
            Subscription::Refused,
            Subscription::Refused,
        ]);
        let registry = Arc::new(Registry::default());
        let (trigger, signal) = shutdown::channel();
        let listener = Listener::new(Arc::clone(&runtime), registry, true);
        let handle = tokio::spawn(listener.run(signal));

        // Attempts at t=0s, 1s, 3s, 7s.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(runtime.subscribed(), 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runtime.subscribed(), 3);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(runtime.subscribed(), 4);
        assert_eq!(runtime.since(), vec![None, None, None, None]);

        trigger.fire();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscription_resumes_after_last_event() {
        let runtime = ScriptedRuntime::new(vec![
            Subscription::Hangs(vec![
                Ok(event("start", "a", 100)),
                Ok(event("start", "b", 105)),
                Err(stream_error()),
            ]),
            Subscription::Hangs(vec![Ok(event("die", "a", 107))]),
        ]);
        let registry = Arc::new(Registry::default());
        let (trigger, signal) = shutdown::channel();
        let listener = Listener::new(Arc::clone(&runtime), Arc::clone(&registry), true);
        let handle = tokio::spawn(listener.run(signal));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(runtime.since(), vec![None, Some(105)]);
        assert_eq!(ids(&registry), vec!["b"]);

        trigger.fire();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscription_without_events_resumes_from_first_subscription() {
        let runtime = ScriptedRuntime::new(vec![
            Subscription::Ends(Vec::new()),
            Subscription::Hangs(Vec::new()),
        ]);
        let (trigger, signal) = shutdown::channel();
        let before = Utc::now();
        let listener = Listener::new(Arc::clone(&runtime), Arc::new(Registry::default()), true);
        let handle = tokio::spawn(listener.run(signal));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let since = runtime.since.lock().unwrap().clone();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0], None);
        assert!(since[1].is_some_and(|ts| ts >= before));

        trigger.fire();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_without_reconnect_ends_task() {
        let runtime = ScriptedRuntime::new(vec![Subscription::Hangs(vec![
            Ok(event("start", "a", 0)),
            Err(stream_error()),
        ])]);
        let registry = Arc::new(Registry::default());
        let (_trigger, signal) = shutdown::channel();
        let listener = Listener::new(Arc::clone(&runtime), Arc::clone(&registry), false);

        tokio::time::timeout(Duration::from_secs(120), listener.run(signal))
            .await
            .unwrap();
        assert_eq!(runtime.subscribed(), 1);
        assert_eq!(ids(&registry), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let runtime = ScriptedRuntime::new(vec![Subscription::Refused]);
        let (trigger, signal) = shutdown::channel();
        let listener = Listener::new(Arc::clone(&runtime), Arc::new(Registry::default()), true)
            .with_backoff(Backoff::new(Duration::from_secs(3600), Duration::from_secs(3600)));
        let handle = tokio::spawn(listener.run(signal));

        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.fire();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(runtime.subscribed(), 1);
    }
}
