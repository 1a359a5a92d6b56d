use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::container::ContainerID;

/// A container the registry believes to be running.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrackedContainer {
    pub container_id: ContainerID,
    pub container_name: String,
    pub started_at: DateTime<Utc>,
}

/// Tracks the set of containers believed to be running on this host.
///
/// Membership is derived solely from lifecycle events observed since process
/// start and is never reconciled against a full listing, so it can drift.
/// Every operation takes the lock exactly once, which makes insert, remove and
/// snapshot atomic with respect to each other.
#[derive(Debug, Default)]
pub struct Registry {
    containers: RwLock<HashMap<ContainerID, TrackedContainer>>,
}

impl Registry {
    /// Starts tracking a container. Re-inserting an id replaces its entry.
    pub fn insert(
        &self,
        container_id: ContainerID,
        container_name: String,
        started_at: DateTime<Utc>,
    ) {
        let entry = TrackedContainer {
            container_id: container_id.clone(),
            container_name,
            started_at,
        };
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(container_id, entry);
    }

    /// Stops tracking a container. Returns whether it was tracked.
    pub fn remove(&self, container_id: &ContainerID) -> bool {
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(container_id)
            .is_some()
    }

    #[cfg(test)]
    pub fn contains(&self, container_id: &ContainerID) -> bool {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(container_id)
    }

    /// Returns a point-in-time copy of the tracked ids, sorted.
    pub fn snapshot(&self) -> Vec<ContainerID> {
        let mut ids: Vec<ContainerID> = self
            .containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Returns a point-in-time copy of all tracked entries, sorted by id.
    pub fn entries(&self) -> Vec<TrackedContainer> {
        let mut entries: Vec<TrackedContainer> = self
            .containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        entries
    }

    pub fn size(&self) -> usize {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
