use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use radiomon_protocol::{MonitorState, StationStatus};

/// Shared, read-mostly view of every station's latest status.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    inner: Arc<Mutex<HashMap<String, StationStatus>>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a station in the `Idle` state and return its writer handle.
    pub fn register(&self, station: &str) -> StatusHandle {
        self.lock()
            .insert(station.to_string(), StationStatus::new(station));
        StatusHandle {
            registry: self.clone(),
            station: station.to_string(),
        }
    }

    /// Writer handle for an existing entry; does not reset it.
    pub fn handle(&self, station: &str) -> StatusHandle {
        StatusHandle {
            registry: self.clone(),
            station: station.to_string(),
        }
    }

    /// Snapshot of all stations, sorted by name.
    pub fn list(&self) -> Vec<StationStatus> {
        let mut all: Vec<StationStatus> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.station.cmp(&b.station));
        all
    }

    pub fn get(&self, station: &str) -> Option<StationStatus> {
        self.lock().get(station).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StationStatus>> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Write access to one station's entry in a [`StatusRegistry`].
#[derive(Debug, Clone)]
pub struct StatusHandle {
    registry: StatusRegistry,
    station: String,
}

impl StatusHandle {
    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn update(&self, f: impl FnOnce(&mut StationStatus)) {
        let mut map = self.registry.lock();
        let status = map
            .entry(self.station.clone())
            .or_insert_with(|| StationStatus::new(&self.station));
        f(status);
    }

    pub fn set_state(&self, state: MonitorState) {
        self.update(|status| status.state = state);
    }

    pub fn snapshot(&self) -> StationStatus {
        self.registry
            .get(&self.station)
            .unwrap_or_else(|| StationStatus::new(&self.station))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_write_through_to_the_registry() {
        let registry = StatusRegistry::new();
        let b = registry.register("b");
        let a = registry.register("a");
        a.set_state(MonitorState::Sampling);
        b.update(|status| status.error_count += 1);

        let all = registry.list();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].station, "a");
        assert_eq!(all[0].state, MonitorState::Sampling);
        assert_eq!(all[1].error_count, 1);
        assert_eq!(b.snapshot().error_count, 1);
    }
}
