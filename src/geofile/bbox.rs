use geo::CoordsIter;
use rayon::prelude::*;
use std::{str::FromStr, sync::Arc};

use crate::error::ClientRequestError;

use super::feature::{Feature, FeatureCollection};

/// Axis-aligned WGS84 query rectangle. Bounds are inclusive on all sides.
///
/// Unlike `geo::Rect`, the corners are not normalized: a box with `min_lon > max_lon` matches
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgsBoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl WgsBoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn contains_coord(&self, coord: &geo::Coord) -> bool {
        self.min_lon <= coord.x
            && coord.x <= self.max_lon
            && self.min_lat <= coord.y
            && coord.y <= self.max_lat
    }

    /// Whether the geometry touches the box.
    ///
    /// Lines and polygons match as soon as one of their vertices lies inside the box. This is a
    /// vertex test, not an intersection test: a polygon covering the whole box without a vertex
    /// inside it does not match.
    pub fn matches(&self, geometry: &geo::Geometry) -> bool {
        match geometry {
            geo::Geometry::Point(point) => self.contains_coord(&point.0),
            geo::Geometry::LineString(_)
            | geo::Geometry::Polygon(_)
            | geo::Geometry::MultiPolygon(_) => geometry
                .coords_iter()
                .any(|coord| self.contains_coord(&coord)),
            _ => false,
        }
    }
}

impl FromStr for WgsBoundingBox {
    type Err = ClientRequestError;

    /// Parse `minLon,minLat,maxLon,maxLat`. Non-finite values are rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientRequestError::InvalidBbox(value.to_string());
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| invalid())?;
        match parts[..] {
            [min_lon, min_lat, max_lon, max_lat]
                if parts.iter().all(|value| value.is_finite()) =>
            {
                Ok(Self::new(min_lon, min_lat, max_lon, max_lat))
            }
            _ => Err(invalid()),
        }
    }
}

/// Features of the collection touching the box, in their original order.
pub fn filter_features(collection: &FeatureCollection, bbox: &WgsBoundingBox) -> FeatureCollection {
    let features: Vec<Arc<Feature>> = collection
        .features
        .par_iter()
        .filter(|feature| bbox.matches(&feature.geometry))
        .cloned()
        .collect();
    FeatureCollection { features }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, point, polygon};
    use rstest::rstest;

    use super::{filter_features, WgsBoundingBox};
    use crate::error::ClientRequestError;
    use crate::geofile::feature::{Feature, FeatureCollection};

    fn test_box() -> WgsBoundingBox {
        WgsBoundingBox::new(-100.0, 40.0, -90.0, 50.0)
    }

    #[rstest]
    #[case(point!(x: -95.0, y: 45.0).into(), true)]
    #[case(point!(x: -95.0, y: 55.0).into(), false)]
    #[case(point!(x: -100.0, y: 40.0).into(), true)] // Corners are inclusive.
    #[case(point!(x: -90.0, y: 50.0).into(), true)]
    #[case(point!(x: -89.999, y: 45.0).into(), false)]
    #[case(
        polygon![(x: -95.0, y: 45.0), (x: -80.0, y: 45.0), (x: -80.0, y: 30.0), (x: -95.0, y: 45.0)].into(),
        true
    )]
    #[case(
        // Covers the whole box without a vertex inside it.
        polygon![(x: -110.0, y: 30.0), (x: -80.0, y: 30.0), (x: -80.0, y: 60.0), (x: -110.0, y: 60.0), (x: -110.0, y: 30.0)].into(),
        false
    )]
    #[case(line_string![(x: -120.0, y: 45.0), (x: -95.0, y: 45.0)].into(), true)]
    #[case(line_string![(x: -120.0, y: 45.0), (x: -60.0, y: 45.0)].into(), false)]
    #[case(
        geo::MultiPolygon::new(vec![
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
            polygon![(x: -95.0, y: 45.0), (x: -94.0, y: 45.0), (x: -94.0, y: 46.0), (x: -95.0, y: 45.0)],
        ]).into(),
        true
    )]
    #[case(geo::MultiPoint::new(vec![point!(x: -95.0, y: 45.0)]).into(), false)]
    fn test_matches(#[case] geometry: geo::Geometry, #[case] expected: bool) {
        assert_eq!(test_box().matches(&geometry), expected);
    }

    #[rstest]
    fn test_polygon_hole_vertex_counts() {
        let exterior = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 0.0)];
        let hole = line_string![(x: -95.0, y: 45.0), (x: -94.0, y: 45.0), (x: -94.0, y: 46.0), (x: -95.0, y: 45.0)];
        let geometry: geo::Geometry = geo::Polygon::new(exterior, vec![hole]).into();
        assert!(test_box().matches(&geometry));
    }

    #[rstest]
    fn test_inverted_box_matches_nothing() {
        let bbox = WgsBoundingBox::new(-90.0, 40.0, -100.0, 50.0);
        assert!(!bbox.matches(&point!(x: -95.0, y: 45.0).into()));
    }

    #[rstest]
    fn test_filter_keeps_order_and_is_idempotent() {
        let collection: FeatureCollection = vec![
            Feature::new(point!(x: -95.0, y: 45.0).into()).with_reference("A"),
            Feature::new(point!(x: -95.0, y: 55.0).into()).with_reference("B"),
            Feature::new(point!(x: -91.0, y: 41.0).into()).with_reference("C"),
            Feature::new(point!(x: 10.0, y: 10.0).into()).with_reference("D"),
            Feature::new(point!(x: -99.0, y: 49.0).into()).with_reference("E"),
        ]
        .into_iter()
        .collect();

        let filtered = filter_features(&collection, &test_box());
        let references: Vec<&str> = filtered.iter().map(|f| f.reference_key()).collect();
        assert_eq!(references, vec!["A", "C", "E"]);
        assert!(filtered.iter().all(|f| test_box().matches(&f.geometry)));
        assert_eq!(filter_features(&filtered, &test_box()), filtered);
    }

    #[rstest]
    #[case("-100,40,-90,50", Ok(WgsBoundingBox::new(-100.0, 40.0, -90.0, 50.0)))]
    #[case(" -100.5, 40 ,-90,50.25", Ok(WgsBoundingBox::new(-100.5, 40.0, -90.0, 50.25)))]
    #[case("-100,40,-90", Err(ClientRequestError::InvalidBbox("-100,40,-90".to_string())))]
    #[case("-100,40,-90,50,1", Err(ClientRequestError::InvalidBbox("-100,40,-90,50,1".to_string())))]
    #[case("a,40,-90,50", Err(ClientRequestError::InvalidBbox("a,40,-90,50".to_string())))]
    #[case("NaN,40,-90,50", Err(ClientRequestError::InvalidBbox("NaN,40,-90,50".to_string())))]
    #[case("", Err(ClientRequestError::InvalidBbox("".to_string())))]
    fn test_parse_bbox(
        #[case] input: &str,
        #[case] expected: Result<WgsBoundingBox, ClientRequestError>,
    ) {
        assert_eq!(input.parse::<WgsBoundingBox>(), expected);
    }
}
