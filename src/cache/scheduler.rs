//! Refresh jobs feeding the snapshot stores.
//!
//! Three independent triggers drive the caches:
//! 1. At startup, the park registry is loaded, then the OSM extract (which also rebuilds the
//!    merged collection).
//! 2. Every `parks` interval, the park registry is reloaded on its own.
//! 3. Every `osm` interval, the OSM extract is reloaded and merged with whatever park registry
//!    snapshot is current at that moment.
//!
//! A failing cycle is logged and leaves every store as it was. Cycles of the same job never
//! overlap: each job holds its own lock for the whole fetch-convert-publish sequence.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::RefreshError;
use crate::geofile::feature::FeatureCollection;
use crate::pota::merge::merge_by_reference;

use super::snapshot::{Snapshot, SnapshotStore};

/// Upstream dataset that can be turned into features.
pub trait FeatureSource: Send + Sync + 'static {
    /// Human readable name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch and convert the whole dataset.
    fn load(&self) -> impl Future<Output = Result<FeatureCollection, RefreshError>> + Send;
}

/// The cached collections served to clients.
#[derive(Debug, Default)]
pub struct CacheSet {
    /// Active parks from the POTA registry.
    pub parks: SnapshotStore,
    /// POTA-tagged OSM features.
    pub osm: SnapshotStore,
    /// Union of both, grouped by reference.
    pub merged: SnapshotStore,
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshIntervals {
    pub parks: Duration,
    pub osm: Duration,
}

pub struct Refresher<P: FeatureSource, O: FeatureSource> {
    parks_source: P,
    osm_source: O,
    caches: Arc<CacheSet>,
    parks_lock: Mutex<()>,
    osm_lock: Mutex<()>,
}

impl<P: FeatureSource, O: FeatureSource> Refresher<P, O> {
    pub fn new(parks_source: P, osm_source: O, caches: Arc<CacheSet>) -> Self {
        Self {
            parks_source,
            osm_source,
            caches,
            parks_lock: Mutex::new(()),
            osm_lock: Mutex::new(()),
        }
    }

    pub fn caches(&self) -> &Arc<CacheSet> {
        &self.caches
    }

    /// Reload the park registry and publish it.
    pub async fn refresh_parks(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let _guard = self.parks_lock.lock().await;
        let start_time = Instant::now();
        let features = self.parks_source.load().await?;
        let snapshot = self.caches.parks.publish(features);
        log::info!(
            "Refreshed {} cache (#{}): {} features in {:.2} seconds",
            self.parks_source.name(),
            snapshot.generation,
            snapshot.features.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(snapshot)
    }

    /// Reload the OSM extract, publish it, then publish its merge with the current park registry.
    pub async fn refresh_osm(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let _guard = self.osm_lock.lock().await;
        let start_time = Instant::now();
        let features = self.osm_source.load().await?;
        let osm_snapshot = self.caches.osm.publish(features);

        let parks = self.caches.parks.current_features();
        let merged = merge_by_reference(&parks, &osm_snapshot.features);
        let merged_snapshot = self.caches.merged.publish(merged);
        log::info!(
            "Refreshed {} cache (#{}): {} features, merged with {} parks into {} features in {:.2} seconds",
            self.osm_source.name(),
            osm_snapshot.generation,
            osm_snapshot.features.len(),
            parks.len(),
            merged_snapshot.features.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(merged_snapshot)
    }

    async fn run_parks_job(&self) {
        if let Err(err) = self.refresh_parks().await {
            log::error!(
                "Failed to refresh {} cache, keeping previous data: {}",
                self.parks_source.name(),
                err
            );
        }
    }

    async fn run_osm_job(&self) {
        if let Err(err) = self.refresh_osm().await {
            log::error!(
                "Failed to refresh {} cache, keeping previous data: {}",
                self.osm_source.name(),
                err
            );
        }
    }

    /// Initial population of all caches. Failures are logged, caches stay empty.
    pub async fn refresh_startup(&self) {
        log::info!("Populating caches");
        self.run_parks_job().await;
        self.run_osm_job().await;
    }

    /// Spawn the startup refresh and both periodic jobs. They stop once `shutdown` is cancelled.
    pub fn spawn(
        self: Arc<Self>,
        intervals: RefreshIntervals,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let startup = {
            let refresher = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = refresher.refresh_startup() => {}
                }
            })
        };
        let parks = {
            let refresher = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_every(intervals.parks, shutdown, || refresher.run_parks_job()).await
            })
        };
        let osm = tokio::spawn(async move {
            run_every(intervals.osm, shutdown, || self.run_osm_job()).await
        });
        vec![startup, parks, osm]
    }
}

/// Run `job` every `period`, starting one period from now. A tick missed while the job was still
/// running is delayed rather than fired in a burst. Cancellation also abandons a running job.
async fn run_every<F, Fut>(period: Duration, shutdown: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = job() => {}
        }
    }
}
