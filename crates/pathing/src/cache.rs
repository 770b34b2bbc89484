use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::path::MasterPath;

/// Corridors shared by all paths of a navigator together with the time of
/// their last use.
#[derive(Default)]
pub(crate) struct PathCache {
    entries: Vec<CachedPath>,
}

struct CachedPath {
    path: Arc<MasterPath>,
    timestamp: Instant,
}

impl PathCache {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, path: Arc<MasterPath>, now: Instant) {
        debug_assert!(!self.contains(path.id()));
        self.entries.push(CachedPath {
            path,
            timestamp: now,
        });
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|entry| entry.path.id() == id)
    }

    /// Marks a corridor as used at `now`. Returns false if the corridor is
    /// not cached.
    pub(crate) fn touch(&mut self, id: u64, now: Instant) -> bool {
        match self.entries.iter_mut().find(|entry| entry.path.id() == id) {
            Some(entry) => {
                entry.timestamp = now;
                true
            }
            None => false,
        }
    }

    /// Removes and disposes all corridors not used for more than `max_age`.
    /// Returns number of evicted corridors.
    pub(crate) fn evict(&mut self, now: Instant, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            let keep = now.saturating_duration_since(entry.timestamp) <= max_age;
            if !keep {
                entry.path.dispose();
            }
            keep
        });

        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {evicted} cached paths, {} remain", self.len());
        }
        evicted
    }

    pub(crate) fn paths(&self) -> impl Iterator<Item = &Arc<MasterPath>> {
        self.entries.iter().map(|entry| &entry.path)
    }

    /// Disposes and removes all corridors.
    pub(crate) fn dispose_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.path.dispose();
        }
    }
}
