pub mod handlers;

use std::sync::Arc;

use axum::{extract::Query, extract::State, routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::scheduler::CacheSet;

use handlers::{BboxParams, StoreSelector};

/// `geojson` and `geobuf` endpoints serving one store.
fn collection_routes(select: StoreSelector) -> Router<Arc<CacheSet>> {
    Router::new()
        .route(
            "/geojson",
            get(
                move |state: State<Arc<CacheSet>>, query: Query<BboxParams>| {
                    handlers::get_geojson(state, query, select)
                },
            ),
        )
        .route(
            "/geobuf",
            get(
                move |state: State<Arc<CacheSet>>, query: Query<BboxParams>| {
                    handlers::get_geobuf(state, query, select)
                },
            ),
        )
}

/// Routes:
/// - `/geojson`, `/geobuf`: merged parks and OSM features.
/// - `/pota-ori/geojson`, `/pota-ori/geobuf`: park registry only.
/// - `/pota-osm/geojson`, `/pota-osm/geobuf`: OSM features only.
/// - `/api/cache_status`: size and age of every cache.
pub fn build_router(caches: Arc<CacheSet>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(collection_routes(|caches| &caches.merged))
        .nest("/pota-ori", collection_routes(|caches| &caches.parks))
        .nest("/pota-osm", collection_routes(|caches| &caches.osm))
        .route("/api/cache_status", get(handlers::cache_status))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(caches)
}

pub async fn serve(
    listener: TcpListener,
    caches: Arc<CacheSet>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, build_router(caches))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
