use crate::cache::scheduler::FeatureSource;
use crate::error::{FetchError, RefreshError};
use crate::fetch::fetch_text;
use crate::geofile::feature::FeatureCollection;

use super::conversion::read_overpass_features;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Every node, way and relation carrying a POTA reference, with inline geometry.
pub const DEFAULT_OVERPASS_QUERY: &str = r#"[out:json][timeout:180];
(
  nwr["communication:amateur_radio:pota"];
);
out geom;"#;

/// Send the query to the Overpass interpreter and return the raw JSON text.
pub async fn download_overpass_data(
    client: &reqwest::Client,
    url: &str,
    query: &str,
) -> Result<String, FetchError> {
    fetch_text(client.get(url).query(&[("data", query)]), url).await
}

/// POTA activation sites mapped in OpenStreetMap.
pub struct OverpassSource {
    client: reqwest::Client,
    url: String,
    query: String,
}

impl OverpassSource {
    pub fn new(client: reqwest::Client, url: String, query: String) -> Self {
        Self { client, url, query }
    }
}

impl FeatureSource for OverpassSource {
    fn name(&self) -> &'static str {
        "overpass"
    }

    async fn load(&self) -> Result<FeatureCollection, RefreshError> {
        log::info!("Downloading OSM data from {}", self.url);
        let json = download_overpass_data(&self.client, &self.url, &self.query).await?;
        Ok(read_overpass_features(&json)?)
    }
}
