use geo::{LineString, Point};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct Feature<G> {
    pub id: String,
    pub geometry: G,
    pub properties: Map<String, Value>,
}

pub type LineFeature = Feature<LineString<f64>>;
pub type PointFeature = Feature<Point<f64>>;

impl<G> Feature<G> {
    pub fn new(id: impl Into<String>, geometry: G) -> Self {
        Feature {
            id: id.into(),
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Property value rendered as text; numbers are accepted for date fields.
    pub fn property_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Fallback identifier for features lacking the id property.
pub fn positional_id(index: usize) -> String {
    format!("fid:{index}")
}

#[derive(Debug, Clone, Default)]
pub struct Layer<G> {
    pub name: String,
    pub features: Vec<Feature<G>>,
}

pub type LineLayer = Layer<LineString<f64>>;
pub type PointLayer = Layer<Point<f64>>;

impl<G> Layer<G> {
    pub fn new(name: impl Into<String>, features: Vec<Feature<G>>) -> Self {
        Layer {
            name: name.into(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
