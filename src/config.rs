use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

pub const EPSG_NAD83_CSRS: i32 = 4617;
pub const EPSG_STATCAN_LAMBERT: i32 = 3348;

/// Distances are in metres of the target CRS, angles in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub node_precision: f64,
    pub min_arc_length: f64,
    pub cluster_tolerance: f64,
    pub overlap_tolerance: f64,
    pub line_proximity: f64,
    pub point_proximity: f64,
    pub min_merging_angle: f64,
    pub min_year: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            node_precision: 0.01,
            min_arc_length: 2.0,
            cluster_tolerance: 0.01,
            overlap_tolerance: 0.01,
            line_proximity: 5.0,
            point_proximity: 5.0,
            min_merging_angle: 5.0,
            min_year: 1960,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub source_epsg: i32,
    pub target_epsg: i32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            source_epsg: EPSG_NAD83_CSRS,
            target_epsg: EPSG_STATCAN_LAMBERT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflationConfig {
    pub tolerance: f64,
    pub min_overlap_ratio: f64,
}

impl Default for ConflationConfig {
    fn default() -> Self {
        ConflationConfig {
            tolerance: 10.0,
            min_overlap_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Property holding the persistent feature identifier.
    pub id_field: String,
    pub thresholds: Thresholds,
    pub projection: ProjectionConfig,
    pub conflation: ConflationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            id_field: "nid".to_string(),
            thresholds: Thresholds::default(),
            projection: ProjectionConfig::default(),
            conflation: ConflationConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        let t = &self.thresholds;
        let positive = [
            ("node_precision", t.node_precision),
            ("cluster_tolerance", t.cluster_tolerance),
            ("overlap_tolerance", t.overlap_tolerance),
            ("conflation.tolerance", self.conflation.tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(Error::Config(format!("{name} must be > 0, got {value}")));
            }
        }
        if !(0.0..=1.0).contains(&self.conflation.min_overlap_ratio) {
            return Err(Error::Config(format!(
                "conflation.min_overlap_ratio must be within [0, 1], got {}",
                self.conflation.min_overlap_ratio
            )));
        }
        if NaiveDate::from_ymd_opt(t.min_year, 1, 1).is_none() {
            return Err(Error::Config(format!("min_year {} is not a valid year", t.min_year)));
        }
        if self.id_field.is_empty() {
            return Err(Error::Config("id_field must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"thresholds": {{"min_arc_length": 3.5}}}}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.thresholds.min_arc_length, 3.5);
        assert_eq!(config.thresholds.line_proximity, 5.0);
        assert_eq!(config.id_field, "nid");
        assert_eq!(config.projection.target_epsg, EPSG_STATCAN_LAMBERT);
    }

    #[test]
    fn rejects_non_positive_precision() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"thresholds": {{"node_precision": 0}}}}"#).unwrap();

        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_year_outside_calendar_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"thresholds": {{"min_year": 2147483647}}}}"#).unwrap();

        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }
}
