use ::geojson::{Feature, GeoJson};
use geo::Geometry;
use std::path::Path;
use tracing::debug;

use super::{LayerReader, RawFeature, read_text};
use crate::error::{Error, Result};

pub struct GeoJsonReader;

impl LayerReader for GeoJsonReader {
    fn read(&self, path: &Path) -> Result<Vec<RawFeature>> {
        let text = read_text(path)?;
        let geojson: GeoJson = text.parse().map_err(|source| Error::GeoJson {
            path: path.to_path_buf(),
            source,
        })?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![Feature::from(g)],
        };

        let raw = convert_features(path, features)?;
        debug!("{} features in {}", raw.len(), path.display());
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "GeoJSON Reader"
    }

    fn accepts(&self, file_name: &str) -> bool {
        file_name.ends_with(".geojson") || file_name.ends_with(".json")
    }
}

/// Features without a geometry are dropped; they carry nothing to validate.
pub(super) fn convert_features(path: &Path, features: Vec<Feature>) -> Result<Vec<RawFeature>> {
    features
        .into_iter()
        .filter_map(|feature| {
            let geometry = feature.geometry?;
            let properties = feature.properties.unwrap_or_default();
            Some(
                Geometry::<f64>::try_from(geometry.value)
                    .map(|geometry| RawFeature {
                        geometry,
                        properties,
                    })
                    .map_err(|source| Error::GeoJson {
                        path: path.to_path_buf(),
                        source,
                    }),
            )
        })
        .collect()
}
