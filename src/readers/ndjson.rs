use ::geojson::Feature;
use std::path::Path;

use super::geojson::convert_features;
use super::{LayerReader, RawFeature, read_text};
use crate::error::{Error, Result};

/// Newline-delimited GeoJSON: one Feature object per line, blank lines allowed.
pub struct NdjsonReader;

impl LayerReader for NdjsonReader {
    fn read(&self, path: &Path) -> Result<Vec<RawFeature>> {
        let text = read_text(path)?;

        let features = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse::<Feature>().map_err(|source| Error::GeoJson {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        convert_features(path, features)
    }

    fn name(&self) -> &'static str {
        "NDJSON Reader"
    }

    fn accepts(&self, file_name: &str) -> bool {
        [".geojsonl", ".geojsons", ".ndjson"]
            .iter()
            .any(|ext| file_name.ends_with(ext))
    }
}
