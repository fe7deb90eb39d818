use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid GeoJSON in {path}: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },

    #[error("unsupported input {0}")]
    UnsupportedInput(PathBuf),

    #[error("PROJ setup failed: {0}")]
    ProjCreate(#[from] proj::ProjCreateError),

    #[error("coordinate transform failed: {0}")]
    Projection(#[from] proj::ProjError),

    #[error("GEOS error: {0}")]
    Geos(#[from] geos::Error),

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
