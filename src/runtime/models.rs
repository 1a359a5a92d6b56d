//! Wire shapes of the Docker Engine API responses the agent consumes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{EventAction, StatsSnapshot};

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct EventMessage {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Action")]
    pub action: String,
    /// Legacy duplicate of `Action`, dropped by newer API versions.
    pub status: String,
    /// Legacy duplicate of `Actor.ID`, dropped by newer API versions.
    pub id: String,
    #[serde(rename = "Actor")]
    pub actor: Actor,
    pub time: i64,
    #[serde(rename = "timeNano")]
    pub time_nano: i64,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct Actor {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Attributes")]
    pub attributes: HashMap<String, String>,
}

impl EventMessage {
    pub fn action(&self) -> EventAction {
        if self.action.is_empty() {
            EventAction::from(self.status.as_str())
        } else {
            EventAction::from(self.action.as_str())
        }
    }

    pub fn container_id(&self) -> &str {
        if self.actor.id.is_empty() {
            &self.id
        } else {
            &self.actor.id
        }
    }

    pub fn attribute(&self, key: &str) -> String {
        self.actor.attributes.get(key).cloned().unwrap_or_default()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        let parsed = if self.time_nano > 0 {
            DateTime::from_timestamp(
                self.time_nano.div_euclid(1_000_000_000),
                self.time_nano.rem_euclid(1_000_000_000) as u32,
            )
        } else {
            DateTime::from_timestamp(self.time, 0)
        };
        parsed.unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct StatsResponse {
    /// Sampling time; the zero time `0001-01-01T00:00:00Z` for stopped containers.
    pub read: String,
    pub name: String,
    pub cpu_stats: CpuStats,
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct CpuStats {
    pub cpu_usage: CpuUsage,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: u32,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct CpuUsage {
    pub total_usage: u64,
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct MemoryStats {
    pub usage: Option<u64>,
    pub limit: u64,
}

impl StatsResponse {
    /// A container that exited but still exists answers with zeroed
    /// timestamps and without host or memory counters.
    pub fn is_running(&self) -> bool {
        let never_read = self.read.is_empty() || self.read.starts_with("0001-01-01");
        let no_counters =
            self.cpu_stats.system_cpu_usage.is_none() && self.memory_stats.usage.is_none();
        !(never_read || no_counters)
    }
}

impl From<StatsResponse> for StatsSnapshot {
    fn from(stats: StatsResponse) -> Self {
        Self {
            container_name: stats.name.trim_start_matches('/').to_owned(),
            cpu_usage: stats.cpu_stats.cpu_usage.total_usage,
            precpu_usage: stats.precpu_stats.cpu_usage.total_usage,
            system_cpu_usage: stats.cpu_stats.system_cpu_usage.unwrap_or_default(),
            presystem_cpu_usage: stats.precpu_stats.system_cpu_usage.unwrap_or_default(),
            percpu_count: stats
                .cpu_stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map_or(0, Vec::len),
            online_cpus: stats.cpu_stats.online_cpus,
            memory_usage: stats.memory_stats.usage.unwrap_or_default(),
            memory_limit: stats.memory_stats.limit,
        }
    }
}
