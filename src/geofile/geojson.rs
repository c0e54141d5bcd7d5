use super::feature::{Feature, FeatureCollection};

pub fn feature_to_geojson(feature: &Feature) -> geojson::Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::from(&feature.geometry)),
        id: feature.id.clone().map(geojson::feature::Id::String),
        properties: Some(feature.output_properties()),
        foreign_members: None,
    }
}

/// The collection carries no `bbox` member: clients query by box already.
pub fn collection_to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: collection
            .iter()
            .map(|feature| feature_to_geojson(feature))
            .collect(),
        foreign_members: None,
    }
}

pub fn write_collection_to_string(collection: &FeatureCollection) -> String {
    geojson::GeoJson::from(collection_to_geojson(collection)).to_string()
}
