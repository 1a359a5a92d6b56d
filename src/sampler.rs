//! Converts cumulative runtime counters into instantaneous utilization.

use crate::container::ContainerID;
use crate::runtime::{self, Runtime, StatsSnapshot};

/// Utilization of one container at one sampling instant.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricPoint {
    pub container_id: ContainerID,
    pub container_name: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// The container exited, or was removed, after being tracked.
    #[error("container `{0}` vanished")]
    Vanished(ContainerID),
    #[error(transparent)]
    Runtime(runtime::Error),
}

/// CPU utilization over the runtime's sampling window, scaled by core count.
///
/// Returns `0.0` for empty or inverted windows, which occur right after a
/// container starts.
pub fn cpu_percent(snapshot: &StatsSnapshot) -> f64 {
    let cpu_delta = snapshot.cpu_usage as f64 - snapshot.precpu_usage as f64;
    let system_delta = snapshot.system_cpu_usage as f64 - snapshot.presystem_cpu_usage as f64;
    if system_delta <= 0.0 || cpu_delta <= 0.0 {
        return 0.0;
    }
    let cpus = if snapshot.percpu_count > 0 {
        snapshot.percpu_count as f64
    } else if snapshot.online_cpus > 0 {
        f64::from(snapshot.online_cpus)
    } else {
        1.0
    };

    cpu_delta / system_delta * cpus * 100.0
}

pub fn memory_percent(snapshot: &StatsSnapshot) -> f64 {
    if snapshot.memory_limit == 0 {
        return 0.0;
    }

    snapshot.memory_usage as f64 / snapshot.memory_limit as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derives a [`MetricPoint`] from one stats snapshot.
pub fn metric_point(container_id: ContainerID, snapshot: StatsSnapshot) -> MetricPoint {
    MetricPoint {
        cpu_percent: round2(cpu_percent(&snapshot)),
        memory_percent: round2(memory_percent(&snapshot)),
        memory_usage: snapshot.memory_usage,
        memory_limit: snapshot.memory_limit,
        container_name: snapshot.container_name,
        container_id,
    }
}

/// Samples one container.
///
/// # Errors
///
/// Returns [`SampleError::Vanished`] if the runtime no longer knows the
/// container or it has stopped, and [`SampleError::Runtime`] for any other
/// failure.
pub async fn sample<R: Runtime>(
    runtime: &R,
    container_id: &ContainerID,
) -> Result<MetricPoint, SampleError> {
    match runtime.stats(container_id).await {
        Ok(snapshot) => Ok(metric_point(container_id.clone(), snapshot)),
        Err(err) if err.is_vanished() => Err(SampleError::Vanished(container_id.clone())),
        Err(err) => Err(SampleError::Runtime(err)),
    }
}
