pub mod geojson;
pub mod ndjson;

use flate2::read::GzDecoder;
use geo::{Geometry, LineString, Point};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::{Feature, LineLayer, PointLayer, positional_id};
use self::geojson::GeoJsonReader;
use self::ndjson::NdjsonReader;

/// A feature as read from disk, before it is sorted into a line or point layer.
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
}

// extract features from one vector file format
pub trait LayerReader: Sync {
    fn read(&self, path: &Path) -> Result<Vec<RawFeature>>;

    fn name(&self) -> &'static str;

    fn accepts(&self, file_name: &str) -> bool;
}

static READERS: [&dyn LayerReader; 2] = [&GeoJsonReader, &NdjsonReader];

fn reader_for(path: &Path) -> Option<&'static dyn LayerReader> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let file_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);

    READERS.iter().copied().find(|r| r.accepts(file_name))
}

/// Reads a file whole, inflating it first when it carries a `.gz` suffix.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut text = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        file.read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Reads a single vector file, or every supported file below a directory.
pub fn read_features(input: &Path) -> Result<Vec<RawFeature>> {
    if input.is_file() {
        let reader = reader_for(input).ok_or_else(|| Error::UnsupportedInput(input.to_path_buf()))?;
        info!("Reading {} with {}", input.display(), reader.name());
        return reader.read(input);
    }

    if !input.is_dir() {
        return Err(Error::UnsupportedInput(input.to_path_buf()));
    }

    let mut files: Vec<_> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && reader_for(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    info!("Found {} vector files in {}", files.len(), input.display());

    let per_file: Vec<Vec<RawFeature>> = files
        .par_iter()
        .progress_count(files.len() as u64)
        .filter_map(|path| {
            let reader = reader_for(path)?;
            match reader.read(path) {
                Ok(features) => Some(features),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    Ok(per_file.into_iter().flatten().collect())
}

fn feature_id(properties: &Map<String, Value>, id_field: &str, index: usize) -> String {
    match properties.get(id_field) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => positional_id(index),
    }
}

fn as_line_string(geometry: Geometry<f64>) -> Option<LineString<f64>> {
    match geometry {
        Geometry::LineString(ls) => Some(ls),
        Geometry::MultiLineString(mut mls) if mls.0.len() == 1 => mls.0.pop(),
        _ => None,
    }
}

fn as_point(geometry: Geometry<f64>) -> Option<Point<f64>> {
    match geometry {
        Geometry::Point(p) => Some(p),
        Geometry::MultiPoint(mut mp) if mp.0.len() == 1 => mp.0.pop(),
        _ => None,
    }
}

/// Keeps the features whose geometry is a single line. Positional ids count
/// over the raw input so they stay stable across runs.
pub fn into_line_layer(name: &str, raw: Vec<RawFeature>, id_field: &str) -> LineLayer {
    let total = raw.len();
    let features: Vec<_> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, f)| {
            let id = feature_id(&f.properties, id_field, index);
            let geometry = as_line_string(f.geometry)?;
            Some(Feature::new(id, geometry).with_properties(f.properties))
        })
        .collect();

    if features.len() < total {
        warn!(
            "{}: skipped {} features that are not single-part lines",
            name,
            total - features.len()
        );
    }
    LineLayer::new(name, features)
}

pub fn into_point_layer(name: &str, raw: Vec<RawFeature>, id_field: &str) -> PointLayer {
    let total = raw.len();
    let features: Vec<_> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, f)| {
            let id = feature_id(&f.properties, id_field, index);
            let geometry = as_point(f.geometry)?;
            Some(Feature::new(id, geometry).with_properties(f.properties))
        })
        .collect();

    if features.len() < total {
        warn!(
            "{}: skipped {} features that are not single points",
            name,
            total - features.len()
        );
    }
    PointLayer::new(name, features)
}
