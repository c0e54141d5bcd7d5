use geo::Intersects;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConversionError;
use crate::geofile::feature::{Feature, FeatureCollection};

/// OSM tag holding the POTA reference of a mapped park.
pub const POTA_TAG: &str = "communication:amateur_radio:pota";

#[derive(Deserialize, Debug)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node {
        id: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        #[serde(default)]
        tags: Map<String, Value>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<Option<OverpassCoord>>,
        #[serde(default)]
        tags: Map<String, Value>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<OverpassMember>,
        #[serde(default)]
        tags: Map<String, Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct OverpassCoord {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize, Debug)]
struct OverpassMember {
    #[serde(rename = "type")]
    member_type: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Option<OverpassCoord>>,
}

/// Parse an Overpass `out geom` JSON response into features.
///
/// Elements that cannot form a geometry are skipped. Every resulting feature is marked with
/// `osm: true`, and the POTA tag, when present, becomes both the `feature` property and the
/// reference.
pub fn read_overpass_features(json: &str) -> Result<FeatureCollection, ConversionError> {
    let response: OverpassResponse =
        serde_json::from_str(json).or(Err(ConversionError::InvalidSourceData))?;
    let num_elements = response.elements.len();
    let features: FeatureCollection = response
        .elements
        .into_iter()
        .filter_map(overpass_element_to_feature)
        .map(tag_pota_feature)
        .collect();
    if features.len() != num_elements {
        log::debug!(
            "Out of {} OSM elements, only {} could be converted to features.",
            num_elements,
            features.len()
        )
    }
    Ok(features)
}

fn tag_pota_feature(mut feature: Feature) -> Feature {
    if let Some(Value::String(reference)) = feature.properties.get(POTA_TAG).cloned() {
        feature
            .properties
            .insert("feature".to_string(), Value::from(reference.as_str()));
        feature.reference = Some(reference);
    }
    feature.with_property("osm", true)
}

fn overpass_element_to_feature(element: OverpassElement) -> Option<Feature> {
    let (osm_type, id, geometry, tags) = match element {
        OverpassElement::Node { id, lat, lon, tags } => {
            let geometry = geo::Point::new(lon?, lat?).into();
            ("node", id, geometry, tags)
        }
        OverpassElement::Way { id, geometry, tags } => {
            let geometry = way_geometry(coords_of(&geometry), &tags)?;
            ("way", id, geometry, tags)
        }
        OverpassElement::Relation { id, members, tags } => {
            let Some(geometry) = relation_geometry(&members) else {
                log::debug!("Skipping relation {} without complete outer rings", id);
                return None;
            };
            ("relation", id, geometry.into(), tags)
        }
        OverpassElement::Other => return None,
    };

    let mut feature = Feature::new(geometry);
    feature.id = Some(format!("{osm_type}/{id}"));
    feature.properties = tags;
    Some(feature)
}

fn coords_of(geometry: &[Option<OverpassCoord>]) -> Vec<geo::Coord> {
    geometry
        .iter()
        .flatten()
        .map(|coord| geo::Coord {
            x: coord.lon,
            y: coord.lat,
        })
        .collect()
}

fn is_closed_ring(coords: &[geo::Coord]) -> bool {
    coords.len() >= 4 && coords.first() == coords.last()
}

fn way_geometry(coords: Vec<geo::Coord>, tags: &Map<String, Value>) -> Option<geo::Geometry> {
    let is_area = tags.get("area").and_then(Value::as_str) != Some("no");
    if is_area && is_closed_ring(&coords) {
        Some(geo::Polygon::new(geo::LineString::new(coords), vec![]).into())
    } else if coords.len() >= 2 {
        Some(geo::LineString::new(coords).into())
    } else {
        None
    }
}

/// Assemble the member ways of a relation into a multipolygon.
///
/// Members with the `inner` role become holes of the first outer polygon containing them, all
/// other way members are outer boundaries.
fn relation_geometry(members: &[OverpassMember]) -> Option<geo::MultiPolygon> {
    let mut outer_segments = Vec::new();
    let mut inner_segments = Vec::new();
    for member in members.iter().filter(|member| member.member_type == "way") {
        let coords = coords_of(&member.geometry);
        if coords.len() < 2 {
            continue;
        }
        if member.role == "inner" {
            inner_segments.push(coords);
        } else {
            outer_segments.push(coords);
        }
    }

    let mut polygons: Vec<geo::Polygon> = join_rings(outer_segments)
        .into_iter()
        .map(|ring| geo::Polygon::new(ring, vec![]))
        .collect();
    if polygons.is_empty() {
        return None;
    }

    for ring in join_rings(inner_segments) {
        let Some(first) = ring.0.first().copied() else {
            continue;
        };
        if let Some(polygon) = polygons
            .iter_mut()
            .find(|polygon| ring_encloses(polygon.exterior(), &first))
        {
            polygon.interiors_push(ring);
        }
    }
    Some(geo::MultiPolygon::new(polygons))
}

fn ring_encloses(ring: &geo::LineString, coord: &geo::Coord) -> bool {
    geo::Polygon::new(ring.clone(), vec![]).intersects(coord)
}

/// Join way segments sharing end points into closed rings. Segments that cannot be closed are
/// dropped.
fn join_rings(mut segments: Vec<Vec<geo::Coord>>) -> Vec<geo::LineString> {
    let mut rings = Vec::new();
    while let Some(mut ring) = segments.pop() {
        while !is_closed_ring(&ring) {
            let Some(&last) = ring.last() else {
                break;
            };
            let Some(position) = segments
                .iter()
                .position(|segment| segment.first() == Some(&last) || segment.last() == Some(&last))
            else {
                break;
            };
            let mut segment = segments.remove(position);
            if segment.first() != Some(&last) {
                segment.reverse();
            }
            ring.extend(segment.into_iter().skip(1));
        }
        if is_closed_ring(&ring) {
            rings.push(geo::LineString::new(ring));
        } else {
            log::debug!("Dropping unclosed ring with {} points", ring.len());
        }
    }
    rings.reverse();
    rings
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::read_overpass_features;
    use crate::error::ConversionError;

    #[rstest]
    #[case("{}")]
    #[case("{\"version\": 0.6}")]
    #[case("not json")]
    fn test_invalid_source_data(#[case] input: &str) {
        assert!(matches!(
            read_overpass_features(input),
            Err(ConversionError::InvalidSourceData)
        ));
    }

    #[rstest]
    fn test_node_with_pota_tag() {
        let input = json!({
            "elements": [{
                "type": "node",
                "id": 1,
                "lat": 45.0,
                "lon": -95.0,
                "tags": {"communication:amateur_radio:pota": "K-0001", "name": "Acadia"}
            }]
        });
        let features = read_overpass_features(&input.to_string()).unwrap();
        assert_eq!(features.len(), 1);
        let feature = &features.features[0];
        assert_eq!(feature.geometry, geo::Geometry::from(geo::Point::new(-95.0, 45.0)));
        assert_eq!(feature.id.as_deref(), Some("node/1"));
        assert_eq!(feature.reference.as_deref(), Some("K-0001"));
        assert_eq!(feature.properties["feature"], json!("K-0001"));
        assert_eq!(feature.properties["name"], json!("Acadia"));
        assert_eq!(feature.properties["osm"], json!(true));
    }

    #[rstest]
    fn test_tag_order_is_kept() {
        let input = r#"{"elements": [{
            "type": "node", "id": 3, "lat": 1.0, "lon": 2.0,
            "tags": {"name": "Zion", "leisure": "park", "communication:amateur_radio:pota": "K-0003"}
        }]}"#;
        let features = read_overpass_features(input).unwrap();
        let keys: Vec<&str> = features.features[0]
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            vec!["name", "leisure", "communication:amateur_radio:pota", "feature", "osm"]
        );
    }

    #[rstest]
    fn test_untagged_element_keeps_no_reference() {
        let input = json!({
            "elements": [{"type": "node", "id": 2, "lat": 1.0, "lon": 2.0}]
        });
        let features = read_overpass_features(&input.to_string()).unwrap();
        let feature = &features.features[0];
        assert_eq!(feature.reference, None);
        assert!(!feature.properties.contains_key("feature"));
        assert_eq!(feature.properties["osm"], json!(true));
    }

    #[rstest]
    fn test_ways_become_polygons_or_lines() {
        let input = json!({
            "elements": [
                {
                    "type": "way",
                    "id": 10,
                    "geometry": [
                        {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 1.0},
                        {"lat": 1.0, "lon": 1.0}, {"lat": 0.0, "lon": 0.0}
                    ],
                    "tags": {"leisure": "park"}
                },
                {
                    "type": "way",
                    "id": 11,
                    "geometry": [{"lat": 0.0, "lon": 0.0}, null, {"lat": 2.0, "lon": 2.0}],
                    "tags": {"highway": "path"}
                },
                {
                    "type": "way",
                    "id": 12,
                    "geometry": [
                        {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 1.0},
                        {"lat": 1.0, "lon": 1.0}, {"lat": 0.0, "lon": 0.0}
                    ],
                    "tags": {"area": "no"}
                },
                {"type": "way", "id": 13, "geometry": [{"lat": 0.0, "lon": 0.0}]}
            ]
        });
        let features = read_overpass_features(&input.to_string()).unwrap();
        assert_eq!(features.len(), 3);
        assert!(matches!(features.features[0].geometry, geo::Geometry::Polygon(_)));
        assert_eq!(
            features.features[1].geometry,
            geo::Geometry::from(geo::LineString::from(vec![(0.0, 0.0), (2.0, 2.0)]))
        );
        assert!(matches!(features.features[2].geometry, geo::Geometry::LineString(_)));
    }

    #[rstest]
    fn test_relation_assembles_split_outer_ring_with_hole() {
        let input = json!({
            "elements": [{
                "type": "relation",
                "id": 20,
                "members": [
                    {
                        "type": "way", "ref": 1, "role": "outer",
                        "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 10.0}, {"lat": 10.0, "lon": 10.0}]
                    },
                    {
                        "type": "way", "ref": 2, "role": "outer",
                        "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 10.0, "lon": 0.0}, {"lat": 10.0, "lon": 10.0}]
                    },
                    {
                        "type": "way", "ref": 3, "role": "inner",
                        "geometry": [
                            {"lat": 2.0, "lon": 2.0}, {"lat": 2.0, "lon": 3.0},
                            {"lat": 3.0, "lon": 3.0}, {"lat": 2.0, "lon": 2.0}
                        ]
                    },
                    {"type": "node", "ref": 4, "role": "label", "lat": 5.0, "lon": 5.0}
                ],
                "tags": {"type": "boundary", "communication:amateur_radio:pota": "K-0002"}
            }]
        });
        let features = read_overpass_features(&input.to_string()).unwrap();
        assert_eq!(features.len(), 1);
        let feature = &features.features[0];
        assert_eq!(feature.id.as_deref(), Some("relation/20"));
        assert_eq!(feature.reference.as_deref(), Some("K-0002"));
        let geo::Geometry::MultiPolygon(multi_polygon) = &feature.geometry else {
            panic!("expected a multipolygon, got {:?}", feature.geometry);
        };
        assert_eq!(multi_polygon.0.len(), 1);
        assert_eq!(multi_polygon.0[0].exterior().0.len(), 5);
        assert_eq!(multi_polygon.0[0].interiors().len(), 1);
    }

    #[rstest]
    fn test_relation_without_closed_ring_is_skipped() {
        let input = json!({
            "elements": [{
                "type": "relation",
                "id": 21,
                "members": [{
                    "type": "way", "ref": 1, "role": "outer",
                    "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 10.0}]
                }]
            }]
        });
        assert!(read_overpass_features(&input.to_string()).unwrap().is_empty());
    }
}
