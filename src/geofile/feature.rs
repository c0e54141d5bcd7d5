use std::sync::Arc;

use serde_json::{Map, Value};

/// Property bag of a feature. Keys are kept in insertion order by serde_json.
pub type Properties = Map<String, Value>;

/// A single activation site geometry with its attributes.
///
/// The reference identifier is kept outside of the property bag so that merging does not need to
/// dig through untyped JSON. It is written back into the properties on output.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: geo::Geometry,
    pub id: Option<String>,
    pub reference: Option<String>,
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: geo::Geometry) -> Self {
        Self {
            geometry,
            id: None,
            reference: None,
            properties: Properties::new(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Key used to group features by site. Missing and empty references share the same key.
    pub fn reference_key(&self) -> &str {
        self.reference.as_deref().unwrap_or("")
    }

    /// Properties as they are served, including the reference.
    pub fn output_properties(&self) -> Properties {
        let mut properties = self.properties.clone();
        if let Some(reference) = &self.reference {
            properties.insert("reference".to_string(), Value::from(reference.as_str()));
        }
        properties
    }
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self::new(value)
    }
}

/// Ordered sequence of features. Features are shared between snapshots, never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Arc<Feature>>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Feature>> {
        self.features.iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

impl FromIterator<Arc<Feature>> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Arc<Feature>>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
