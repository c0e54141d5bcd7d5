use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::scheduler::CacheSet;
use crate::cache::snapshot::SnapshotStore;
use crate::error::{ClientRequestError, QueryError};
use crate::geofile::bbox::{filter_features, WgsBoundingBox};
use crate::geofile::feature::FeatureCollection;
use crate::geofile::{geobuf, geojson};

/// Picks the store a route serves from.
pub type StoreSelector = fn(&CacheSet) -> &SnapshotStore;

#[derive(Debug, Deserialize)]
pub struct BboxParams {
    bbox: Option<String>,
}

impl BboxParams {
    fn parse(&self) -> Result<WgsBoundingBox, ClientRequestError> {
        match &self.bbox {
            Some(bbox) => bbox.parse(),
            None => Err(ClientRequestError::MissingBbox),
        }
    }
}

/// Filter the selected store by the query box. The filter runs on the blocking pool since it
/// fans out over rayon.
async fn query_store(
    caches: &CacheSet,
    params: &BboxParams,
    select: StoreSelector,
) -> Result<FeatureCollection, QueryError> {
    let start_time = Instant::now();
    let bbox = params.parse().map_err(|err| {
        log::warn!("Rejecting query: {}", err);
        err
    })?;
    let features = select(caches).current_features();
    let total = features.len();
    let filtered =
        tokio::task::spawn_blocking(move || filter_features(&features, &bbox)).await?;
    log::debug!(
        "Returning {} features out of {} for {:?} in {:.3} seconds",
        filtered.len(),
        total,
        bbox,
        start_time.elapsed().as_secs_f64()
    );
    Ok(filtered)
}

pub async fn get_geojson(
    State(caches): State<Arc<CacheSet>>,
    Query(params): Query<BboxParams>,
    select: StoreSelector,
) -> Result<Response, QueryError> {
    let filtered = query_store(&caches, &params, select).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/geo+json")],
        geojson::write_collection_to_string(&filtered),
    )
        .into_response())
}

pub async fn get_geobuf(
    State(caches): State<Arc<CacheSet>>,
    Query(params): Query<BboxParams>,
    select: StoreSelector,
) -> Result<Response, QueryError> {
    let filtered = query_store(&caches, &params, select).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        geobuf::encode_collection(&filtered),
    )
        .into_response())
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StoreStatus {
    status: &'static str,
    elements_count: usize,
    generation: u64,
    last_update: Option<DateTime<Utc>>,
}

impl From<&SnapshotStore> for StoreStatus {
    fn from(store: &SnapshotStore) -> Self {
        match store.current() {
            Some(snapshot) => Self {
                status: "Cache available",
                elements_count: snapshot.features.len(),
                generation: snapshot.generation,
                last_update: Some(snapshot.published_at),
            },
            None => Self {
                status: "No data cached",
                elements_count: 0,
                generation: 0,
                last_update: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    merged: StoreStatus,
    #[serde(rename = "pota-ori")]
    parks: StoreStatus,
    #[serde(rename = "pota-osm")]
    osm: StoreStatus,
}

pub async fn cache_status(State(caches): State<Arc<CacheSet>>) -> Json<CacheStatus> {
    Json(CacheStatus {
        merged: StoreStatus::from(&caches.merged),
        parks: StoreStatus::from(&caches.parks),
        osm: StoreStatus::from(&caches.osm),
    })
}
