use chrono::{DateTime, Utc};

use crate::registry::TrackedContainer;

#[derive(Debug, serde::Serialize)]
pub struct Health {
    pub status: &'static str,
    pub host_id: String,
    pub tracked_containers: usize,
    pub pending_alerts: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize)]
pub struct Containers {
    pub containers: Vec<TrackedContainer>,
}
