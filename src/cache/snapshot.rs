use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

use crate::geofile::feature::FeatureCollection;

/// A published, immutable version of a cached collection.
#[derive(Debug)]
pub struct Snapshot {
    /// Number of publishes so far, starting at 1.
    pub generation: u64,
    pub published_at: DateTime<Utc>,
    pub features: Arc<FeatureCollection>,
}

/// Holder of the latest snapshot of one cached collection.
///
/// Readers load the current snapshot without locking, writers replace it wholesale under a short
/// lock that only orders generations. A reader holding a snapshot keeps it alive after a newer one
/// has been published.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published snapshot, or `None` while nothing has been published yet.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Features of the latest snapshot, empty while nothing has been published yet.
    pub fn current_features(&self) -> Arc<FeatureCollection> {
        self.current()
            .map(|snapshot| Arc::clone(&snapshot.features))
            .unwrap_or_default()
    }

    /// Replace the current snapshot and return the new snapshot.
    pub fn publish(&self, features: FeatureCollection) -> Arc<Snapshot> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self
            .current()
            .map_or(0, |snapshot| snapshot.generation)
            + 1;
        let snapshot = Arc::new(Snapshot {
            generation,
            published_at: Utc::now(),
            features: Arc::new(features),
        });
        self.current.store(Some(Arc::clone(&snapshot)));
        log::debug!(
            "Published snapshot generation {} with {} features",
            generation,
            snapshot.features.len()
        );
        snapshot
    }
}
