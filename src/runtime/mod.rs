//! Container runtime boundary.
//!
//! The monitoring engine only needs two things from the runtime: an ordered
//! stream of container lifecycle events and a one-shot resource counter
//! snapshot per container. [`Runtime`] captures exactly that, and
//! [`docker::DockerClient`] implements it against the Docker Engine API served
//! on a unix socket.

pub mod docker;
mod error;
mod models;

use chrono::{DateTime, Utc};

use crate::container::ContainerID;

pub use error::{Error, Result};

/// The lifecycle transition reported by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    Start,
    Die,
    Other(String),
}

impl From<&str> for EventAction {
    fn from(action: &str) -> Self {
        match action {
            "start" => Self::Start,
            "die" => Self::Die,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// One container lifecycle event, as delivered by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEvent {
    pub action: EventAction,
    pub container_id: ContainerID,
    /// Display name from the event attributes, empty when the runtime omitted it.
    pub container_name: String,
    /// Exit code attribute of `die` events, empty when absent.
    pub exit_code: String,
    pub timestamp: DateTime<Utc>,
}

/// Cumulative resource counters for one container.
///
/// The runtime computes the sampling window itself, so a single snapshot
/// carries both the current and the previous reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub container_name: String,
    /// CPU time consumed by the container.
    pub cpu_usage: u64,
    pub precpu_usage: u64,
    /// CPU time consumed by the whole host.
    pub system_cpu_usage: u64,
    pub presystem_cpu_usage: u64,
    /// Number of per-core counters reported, zero when the runtime gives no breakdown.
    pub percpu_count: usize,
    /// Online CPU count as reported by the runtime, zero when unknown.
    pub online_cpus: u32,
    pub memory_usage: u64,
    pub memory_limit: u64,
}

/// An ordered source of container lifecycle events.
pub trait EventStream: Send {
    /// Waits for the next event. `Ok(None)` means the runtime closed the stream.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<ContainerEvent>>> + Send;
}

pub trait Runtime: Send + Sync + 'static {
    type Events: EventStream;

    /// Opens a subscription to container lifecycle events.
    ///
    /// With `since` set, events from that instant on are replayed before
    /// live ones, so a resumed subscription misses nothing.
    fn subscribe(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Self::Events>> + Send;

    /// Fetches one non-streaming stats snapshot.
    ///
    /// Fails with [`Error::NotFound`] once the container no longer exists and
    /// with [`Error::NotRunning`] while it exists but has stopped.
    fn stats(
        &self,
        container_id: &ContainerID,
    ) -> impl Future<Output = Result<StatsSnapshot>> + Send;
}
