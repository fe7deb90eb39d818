use fgbfile::FgbFile;
use geo::{LineString, Point, Polygon};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::conflation::ArcMatch;
use crate::error::{Error, Result};
use crate::meshblock::MeshblockResult;
use crate::model::{LineLayer, PointLayer};
use crate::rules::{Code, Finding};

#[derive(Serialize)]
pub struct FlaggedArc {
    pub geo: LineString,
    pub id: String,
    pub e101: bool,
    pub e103: bool,
    pub e201: bool,
    pub e202: bool,
    pub e203: bool,
    pub e204: bool,
    pub e205: bool,
    pub e206: bool,
    pub e208: bool,
    pub e401: bool,
    pub e402: bool,
    pub e403: bool,
}

#[derive(Serialize)]
pub struct FlaggedPoint {
    pub geo: Point,
    pub id: String,
    pub e102: bool,
    pub e207: bool,
    pub e401: bool,
    pub e402: bool,
    pub e403: bool,
}

#[derive(Serialize)]
pub struct ReferencePoint {
    pub geo: Point,
    pub layer: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct MissingArc {
    pub geo: LineString,
    pub layer: String,
    pub id: String,
}

#[derive(Serialize)]
pub struct Meshblock {
    pub geo: Polygon,
    pub bb_uid: u64,
    pub area: f64,
}

#[derive(Serialize)]
pub struct ConflatedArc {
    pub geo: LineString,
    pub id: String,
    pub class: String,
    pub component: u64,
    pub matches: String,
}

/// Feature indices flagged per code, for quick membership tests.
struct FlagLookup {
    flagged: Vec<(Code, HashSet<usize>)>,
}

impl FlagLookup {
    fn new(findings: &[Finding]) -> Self {
        FlagLookup {
            flagged: findings
                .iter()
                .map(|f| (f.code, f.flagged.iter().copied().collect()))
                .collect(),
        }
    }

    fn is_flagged(&self, code: Code, index: usize) -> bool {
        self.flagged
            .iter()
            .any(|(c, set)| *c == code && set.contains(&index))
    }
}

fn write_features<T: Serialize>(features: &Vec<T>, path: &Path, epsg: i32) -> Result<()> {
    if features.is_empty() {
        debug!("Nothing to write to {}", path.display());
        return Ok(());
    }
    let write_error = |e: &dyn std::fmt::Debug| Error::Write {
        path: path.to_path_buf(),
        message: format!("{e:?}"),
    };
    FgbFile::create(&*path.to_string_lossy())
        .map_err(|e| write_error(&e))?
        .epsg(epsg)
        .write_features(features)
        .map_err(|e| write_error(&e))?;

    info!("✓ Wrote {} features to {}", features.len(), path.display());
    Ok(())
}

pub fn write_flagged_arcs(layer: &LineLayer, findings: &[Finding], path: &Path, epsg: i32) -> Result<()> {
    let lookup = FlagLookup::new(findings);
    let arcs: Vec<FlaggedArc> = layer
        .features
        .par_iter()
        .enumerate()
        .map(|(i, f)| FlaggedArc {
            geo: f.geometry.clone(),
            id: f.id.clone(),
            e101: lookup.is_flagged(Code::E101, i),
            e103: lookup.is_flagged(Code::E103, i),
            e201: lookup.is_flagged(Code::E201, i),
            e202: lookup.is_flagged(Code::E202, i),
            e203: lookup.is_flagged(Code::E203, i),
            e204: lookup.is_flagged(Code::E204, i),
            e205: lookup.is_flagged(Code::E205, i),
            e206: lookup.is_flagged(Code::E206, i),
            e208: lookup.is_flagged(Code::E208, i),
            e401: lookup.is_flagged(Code::E401, i),
            e402: lookup.is_flagged(Code::E402, i),
            e403: lookup.is_flagged(Code::E403, i),
        })
        .collect();
    write_features(&arcs, path, epsg)
}

pub fn write_flagged_points(layer: &PointLayer, findings: &[Finding], path: &Path, epsg: i32) -> Result<()> {
    let lookup = FlagLookup::new(findings);
    let points: Vec<FlaggedPoint> = layer
        .features
        .par_iter()
        .enumerate()
        .map(|(i, f)| FlaggedPoint {
            geo: f.geometry,
            id: f.id.clone(),
            e102: lookup.is_flagged(Code::E102, i),
            e207: lookup.is_flagged(Code::E207, i),
            e401: lookup.is_flagged(Code::E401, i),
            e402: lookup.is_flagged(Code::E402, i),
            e403: lookup.is_flagged(Code::E403, i),
        })
        .collect();
    write_features(&points, path, epsg)
}

/// Reference geometries derived by the rules, such as deadend nodes.
pub fn write_reference_points(layer_name: &str, findings: &[Finding], path: &Path, epsg: i32) -> Result<()> {
    let points: Vec<ReferencePoint> = findings
        .iter()
        .flat_map(|finding| {
            finding.reference_points.iter().map(|p| ReferencePoint {
                geo: *p,
                layer: layer_name.to_string(),
                code: finding.code.to_string(),
            })
        })
        .collect();
    write_features(&points, path, epsg)
}

pub fn write_meshblocks(result: &MeshblockResult, dir: &Path, epsg: i32) -> Result<()> {
    use geo::Area;

    let blocks: Vec<Meshblock> = result
        .meshblocks
        .iter()
        .enumerate()
        .map(|(i, poly)| Meshblock {
            geo: poly.clone(),
            bb_uid: i as u64 + 1,
            area: poly.unsigned_area(),
        })
        .collect();
    write_features(&blocks, &dir.join("meshblock.fgb"), epsg)?;

    let missing: Vec<MissingArc> = result
        .missing_arcs
        .iter()
        .map(|(source, geometry)| MissingArc {
            geo: geometry.clone(),
            layer: source.layer.clone(),
            id: source.id.clone(),
        })
        .collect();
    write_features(&missing, &dir.join("missing_arcs.fgb"), epsg)
}

pub fn write_conflation(layer: &LineLayer, matches: &[ArcMatch], path: &Path, epsg: i32) -> Result<()> {
    let arcs: Vec<ConflatedArc> = layer
        .features
        .iter()
        .zip(matches)
        .map(|(f, m)| ConflatedArc {
            geo: f.geometry.clone(),
            id: m.id.clone(),
            class: m.class.to_string(),
            component: m.component as u64,
            matches: m.matches.join(","),
        })
        .collect();
    write_features(&arcs, path, epsg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_code_and_index() {
        let findings = vec![Finding::new(Code::E203, vec![2]), Finding::new(Code::E101, vec![0, 2])];
        let lookup = FlagLookup::new(&findings);
        assert!(lookup.is_flagged(Code::E203, 2));
        assert!(!lookup.is_flagged(Code::E203, 0));
        assert!(lookup.is_flagged(Code::E101, 0));
        assert!(!lookup.is_flagged(Code::E206, 2));
    }

    #[test]
    fn empty_layers_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fgb");
        write_reference_points("roadseg", &[], &path, 3348).unwrap();
        assert!(!path.exists());
    }
}
