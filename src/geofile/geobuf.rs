//! Geobuf encoding of feature collections.
//!
//! Geobuf is a protobuf representation of GeoJSON (see `geobuf.proto` in the mapbox/geobuf
//! project). Property keys are stored once in a global table, values per feature, and coordinates
//! as delta-encoded integers scaled by a power of ten derived from the data.

use indexmap::IndexSet;
use prost::Message;
use serde_json::Value;

use super::feature::{Feature, FeatureCollection};

/// Coordinates are never stored with more than this many decimal digits.
const MAX_PRECISION: u32 = 6;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Data {
    #[prost(string, repeated, tag = "1")]
    pub keys: Vec<String>,
    #[prost(uint32, optional, tag = "2")]
    pub dimensions: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub precision: Option<u32>,
    #[prost(oneof = "DataType", tags = "4, 5, 6")]
    pub data_type: Option<DataType>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum DataType {
    #[prost(message, tag = "4")]
    FeatureCollection(GeobufFeatureCollection),
    #[prost(message, tag = "5")]
    Feature(GeobufFeature),
    #[prost(message, tag = "6")]
    Geometry(GeobufGeometry),
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GeobufFeatureCollection {
    #[prost(message, repeated, tag = "1")]
    pub features: Vec<GeobufFeature>,
    #[prost(message, repeated, tag = "13")]
    pub values: Vec<GeobufValue>,
    #[prost(uint32, repeated, packed = "true", tag = "15")]
    pub custom_properties: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GeobufFeature {
    #[prost(message, optional, tag = "1")]
    pub geometry: Option<GeobufGeometry>,
    #[prost(oneof = "FeatureId", tags = "11, 12")]
    pub id: Option<FeatureId>,
    #[prost(message, repeated, tag = "13")]
    pub values: Vec<GeobufValue>,
    #[prost(uint32, repeated, packed = "true", tag = "14")]
    pub properties: Vec<u32>,
    #[prost(uint32, repeated, packed = "true", tag = "15")]
    pub custom_properties: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum FeatureId {
    #[prost(string, tag = "11")]
    Id(String),
    #[prost(sint64, tag = "12")]
    IntId(i64),
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GeobufGeometry {
    #[prost(enumeration = "GeometryType", required, tag = "1")]
    pub r#type: i32,
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub lengths: Vec<u32>,
    #[prost(sint64, repeated, packed = "true", tag = "3")]
    pub coords: Vec<i64>,
    #[prost(message, repeated, tag = "4")]
    pub geometries: Vec<GeobufGeometry>,
    #[prost(message, repeated, tag = "13")]
    pub values: Vec<GeobufValue>,
    #[prost(uint32, repeated, packed = "true", tag = "15")]
    pub custom_properties: Vec<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum GeometryType {
    Point = 0,
    MultiPoint = 1,
    LineString = 2,
    MultiLineString = 3,
    Polygon = 4,
    MultiPolygon = 5,
    GeometryCollection = 6,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GeobufValue {
    #[prost(oneof = "ValueType", tags = "1, 2, 3, 4, 5, 6")]
    pub value_type: Option<ValueType>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ValueType {
    #[prost(string, tag = "1")]
    StringValue(String),
    #[prost(double, tag = "2")]
    DoubleValue(f64),
    #[prost(uint64, tag = "3")]
    PosIntValue(u64),
    #[prost(uint64, tag = "4")]
    NegIntValue(u64),
    #[prost(bool, tag = "5")]
    BoolValue(bool),
    #[prost(string, tag = "6")]
    JsonValue(String),
}

/// Encode the collection as a Geobuf `Data` message.
pub fn encode_collection(collection: &FeatureCollection) -> Vec<u8> {
    build_data(collection).encode_to_vec()
}

pub fn build_data(collection: &FeatureCollection) -> Data {
    let precision = detect_precision(collection);
    let factor = 10f64.powi(precision as i32);

    let mut keys: IndexSet<String> = IndexSet::new();
    let features = collection
        .iter()
        .map(|feature| encode_feature(feature, factor, &mut keys))
        .collect();

    Data {
        keys: keys.into_iter().collect(),
        dimensions: None,
        precision: (precision != MAX_PRECISION).then_some(precision),
        data_type: Some(DataType::FeatureCollection(GeobufFeatureCollection {
            features,
            values: Vec::new(),
            custom_properties: Vec::new(),
        })),
    }
}

fn encode_feature(feature: &Feature, factor: f64, keys: &mut IndexSet<String>) -> GeobufFeature {
    let mut values = Vec::new();
    let mut properties = Vec::new();
    for (key, value) in feature.output_properties() {
        let (key_index, _) = keys.insert_full(key);
        properties.push(key_index as u32);
        properties.push(values.len() as u32);
        values.push(encode_value(&value));
    }

    GeobufFeature {
        geometry: encode_geometry(&feature.geometry, factor),
        id: feature.id.clone().map(FeatureId::Id),
        values,
        properties,
        custom_properties: Vec::new(),
    }
}

fn encode_value(value: &Value) -> GeobufValue {
    let value_type = match value {
        Value::String(string) => ValueType::StringValue(string.clone()),
        Value::Bool(boolean) => ValueType::BoolValue(*boolean),
        Value::Number(number) => {
            if let Some(positive) = number.as_u64() {
                ValueType::PosIntValue(positive)
            } else if let Some(negative) = number.as_i64() {
                ValueType::NegIntValue(negative.unsigned_abs())
            } else {
                let float = number.as_f64().unwrap_or(f64::NAN);
                if float.fract() != 0.0 || !float.is_finite() {
                    ValueType::DoubleValue(float)
                } else if float >= 0.0 {
                    ValueType::PosIntValue(float as u64)
                } else {
                    ValueType::NegIntValue((-float) as u64)
                }
            }
        }
        other => ValueType::JsonValue(other.to_string()),
    };
    GeobufValue {
        value_type: Some(value_type),
    }
}

fn encode_geometry(geometry: &geo::Geometry, factor: f64) -> Option<GeobufGeometry> {
    let mut lengths = Vec::new();
    let mut coords = Vec::new();
    let geometry_type = match geometry {
        geo::Geometry::Point(point) => {
            coords.push(scale(point.x(), factor));
            coords.push(scale(point.y(), factor));
            GeometryType::Point
        }
        geo::Geometry::LineString(line) => {
            push_line(&mut coords, line, false, factor);
            GeometryType::LineString
        }
        geo::Geometry::Polygon(polygon) => {
            let rings: Vec<&geo::LineString> = polygon_rings(polygon).collect();
            if rings.len() != 1 {
                lengths.extend(rings.iter().map(|ring| closed_len(ring)));
            }
            for ring in rings {
                push_line(&mut coords, ring, true, factor);
            }
            GeometryType::Polygon
        }
        geo::Geometry::MultiPolygon(multi_polygon) => {
            let polygons = &multi_polygon.0;
            let single_ring = polygons.len() == 1 && polygons[0].interiors().is_empty();
            if !single_ring {
                lengths.push(polygons.len() as u32);
                for polygon in polygons {
                    lengths.push(1 + polygon.interiors().len() as u32);
                    lengths.extend(polygon_rings(polygon).map(closed_len));
                }
            }
            for polygon in polygons {
                for ring in polygon_rings(polygon) {
                    push_line(&mut coords, ring, true, factor);
                }
            }
            GeometryType::MultiPolygon
        }
        _ => return None,
    };

    Some(GeobufGeometry {
        r#type: geometry_type as i32,
        lengths,
        coords,
        geometries: Vec::new(),
        values: Vec::new(),
        custom_properties: Vec::new(),
    })
}

fn polygon_rings(polygon: &geo::Polygon) -> impl Iterator<Item = &geo::LineString> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
}

/// Number of stored points of a closed ring, whose repeated last point is omitted.
fn closed_len(ring: &geo::LineString) -> u32 {
    ring.0.len().saturating_sub(1) as u32
}

fn push_line(coords: &mut Vec<i64>, line: &geo::LineString, closed: bool, factor: f64) {
    let len = if closed {
        line.0.len().saturating_sub(1)
    } else {
        line.0.len()
    };
    let (mut sum_x, mut sum_y) = (0i64, 0i64);
    for coord in &line.0[..len] {
        let dx = scale(coord.x, factor) - sum_x;
        let dy = scale(coord.y, factor) - sum_y;
        coords.push(dx);
        coords.push(dy);
        sum_x += dx;
        sum_y += dy;
    }
}

fn scale(value: f64, factor: f64) -> i64 {
    (value * factor).round() as i64
}

/// Smallest number of decimal digits that represents every coordinate exactly, capped at
/// `MAX_PRECISION`.
fn detect_precision(collection: &FeatureCollection) -> u32 {
    use geo::CoordsIter;

    let mut precision = 0;
    for feature in collection.iter() {
        for coord in feature.geometry.coords_iter() {
            for value in [coord.x, coord.y] {
                while precision < MAX_PRECISION && !is_exact(value, precision) {
                    precision += 1;
                }
            }
            if precision == MAX_PRECISION {
                return precision;
            }
        }
    }
    precision
}

fn is_exact(value: f64, precision: u32) -> bool {
    let factor = 10f64.powi(precision as i32);
    !value.is_finite() || (value * factor).round() / factor == value
}
