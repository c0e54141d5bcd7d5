use serde::Deserialize;

use crate::error::ConversionError;
use crate::geofile::feature::{Feature, FeatureCollection};

/// Columns without which no row can be turned into a feature.
const REQUIRED_COLUMNS: [&str; 4] = ["reference", "active", "latitude", "longitude"];

/// One row of the POTA park registry. Unknown columns are ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct ParkRecord {
    reference: String,
    name: String,
    active: String,
    entity_id: String,
    location_desc: String,
    grid: String,
    latitude: String,
    longitude: String,
}

impl ParkRecord {
    fn is_active(&self) -> bool {
        self.active == "1"
    }

    /// Longitude/latitude point, if both coordinates are finite numbers.
    fn point(&self) -> Option<geo::Point> {
        let lon: f64 = self.longitude.trim().parse().ok()?;
        let lat: f64 = self.latitude.trim().parse().ok()?;
        (lon.is_finite() && lat.is_finite()).then(|| geo::Point::new(lon, lat))
    }

    fn into_feature(self, point: geo::Point) -> Feature {
        Feature::new(point.into())
            .with_reference(self.reference)
            .with_property("name", self.name)
            .with_property("entityId", self.entity_id)
            .with_property("locationDesc", self.location_desc)
            .with_property("grid", self.grid)
    }
}

/// Parse the park registry CSV into point features, keeping only active parks.
///
/// Rows that cannot be decoded or whose coordinates are not numeric are skipped.
pub fn read_park_features(csv_text: &str) -> Result<FeatureCollection, ConversionError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header.trim() == column) {
            return Err(ConversionError::MissingColumn(column));
        }
    }

    let mut num_rows = 0;
    let mut features = Vec::new();
    for (row_idx, record) in reader.deserialize::<ParkRecord>().enumerate() {
        num_rows += 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log::debug!("Skipping invalid CSV row {}: {}", row_idx + 1, err);
                continue;
            }
        };
        if !record.is_active() {
            continue;
        }
        let Some(point) = record.point() else {
            log::debug!(
                "Skipping park {} due to invalid coordinates: lat={}, lon={}",
                record.reference,
                record.latitude,
                record.longitude
            );
            continue;
        };
        features.push(record.into_feature(point));
    }

    log::debug!(
        "Read {} active parks out of {} CSV rows",
        features.len(),
        num_rows
    );
    Ok(features.into_iter().collect())
}
