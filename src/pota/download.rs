use crate::cache::scheduler::FeatureSource;
use crate::error::{FetchError, RefreshError};
use crate::fetch::fetch_text;
use crate::geofile::feature::FeatureCollection;

use super::conversion::read_park_features;

pub const DEFAULT_CSV_URL: &str = "https://pota.app/all_parks_ext.csv";

pub async fn download_park_csv(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    fetch_text(client.get(url), url).await
}

/// The canonical POTA park registry.
pub struct ParkCsvSource {
    client: reqwest::Client,
    url: String,
}

impl ParkCsvSource {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

impl FeatureSource for ParkCsvSource {
    fn name(&self) -> &'static str {
        "park registry"
    }

    async fn load(&self) -> Result<FeatureCollection, RefreshError> {
        log::info!("Downloading park registry from {}", self.url);
        let csv_text = download_park_csv(&self.client, &self.url).await?;
        Ok(read_park_features(&csv_text)?)
    }
}
