pub mod bbox;
pub mod feature;
pub mod geobuf;
pub mod geojson;
