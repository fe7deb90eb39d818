use geo::{Area, Geometry as GeoGeometry, LineString, Polygon};
use geos::{Geom, Geometry};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::geometry::planar_length;
use crate::model::{LineFeature, LineLayer};
use crate::network::{LayerRole, LineNetwork};

/// Where a merged arc came from.
#[derive(Debug, Clone, Serialize)]
pub struct ArcSource {
    pub layer: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeshblockSummary {
    pub arc_count: usize,
    pub forming_count: usize,
    pub missing_count: usize,
    pub meshblock_count: usize,
    pub total_area: f64,
}

pub struct MeshblockResult {
    /// Per merged arc: does it bound a meshblock on at least one side.
    pub forming: Vec<bool>,
    pub missing_arcs: Vec<(ArcSource, LineString<f64>)>,
    pub meshblocks: Vec<Polygon<f64>>,
}

impl MeshblockResult {
    pub fn summary(&self) -> MeshblockSummary {
        let forming_count = self.forming.iter().filter(|f| **f).count();
        MeshblockSummary {
            arc_count: self.forming.len(),
            forming_count,
            missing_count: self.forming.len() - forming_count,
            meshblock_count: self.meshblocks.len(),
            total_area: self.meshblocks.iter().map(|p| p.unsigned_area()).sum(),
        }
    }
}

/// Merges the road arcs with boundary-only arcs and works out which of them
/// can close a polygon. Arcs that cannot (dangles, bridges between blocks,
/// zero-length arcs) form the missing arcs layer.
pub fn polygon_forming(
    roads: &LineLayer,
    boundary: Option<&LineLayer>,
    node_precision: f64,
) -> (LineNetwork, Vec<ArcSource>, Vec<bool>) {
    let mut features: Vec<LineFeature> = Vec::with_capacity(roads.len());
    let mut sources = Vec::with_capacity(roads.len());
    for layer in std::iter::once(roads).chain(boundary) {
        for feature in &layer.features {
            sources.push(ArcSource {
                layer: layer.name.clone(),
                id: feature.id.clone(),
            });
            features.push(feature.clone());
        }
    }

    let network = LineNetwork::new(LineLayer::new("meshblock_arcs", features), LayerRole::Boundary, node_precision);
    let bridges = network.graph.bridges();
    let forming = network
        .arcs()
        .iter()
        .enumerate()
        .map(|(i, arc)| {
            network.graph.arc_nodes(i).is_some() && !bridges[i] && planar_length(&arc.geometry) > 0.0
        })
        .collect();
    (network, sources, forming)
}

pub fn build_meshblocks(roads: &LineLayer, boundary: Option<&LineLayer>, node_precision: f64) -> Result<MeshblockResult> {
    let (network, sources, forming) = polygon_forming(roads, boundary, node_precision);

    let missing_arcs: Vec<(ArcSource, LineString<f64>)> = forming
        .iter()
        .enumerate()
        .filter(|(_, forms)| !**forms)
        .map(|(i, _)| (sources[i].clone(), network.arcs()[i].geometry.clone()))
        .collect();
    if !missing_arcs.is_empty() {
        warn!(
            "{} arcs cannot form meshblocks: {}",
            missing_arcs.len(),
            missing_arcs
                .iter()
                .map(|(source, _)| format!("{}:{}", source.layer, source.id))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let forming_arcs: Vec<&LineString<f64>> = network
        .arcs()
        .iter()
        .zip(&forming)
        .filter(|(_, forms)| **forms)
        .map(|(arc, _)| &arc.geometry)
        .collect();

    info!("Polygonizing {} arcs", forming_arcs.len());
    let meshblocks = polygonize(&forming_arcs)?;
    info!("Built {} meshblocks", meshblocks.len());

    Ok(MeshblockResult {
        forming,
        missing_arcs,
        meshblocks,
    })
}

fn polygonize(arcs: &[&LineString<f64>]) -> Result<Vec<Polygon<f64>>> {
    if arcs.is_empty() {
        return Ok(Vec::new());
    }

    let lines: Vec<Geometry> = arcs
        .par_iter()
        .progress_count(arcs.len() as u64)
        .map(|ls| Geometry::try_from(*ls))
        .collect::<std::result::Result<_, _>>()?;

    let polygons = Geometry::polygonize(&lines)?;

    explode_polygons(polygons)
        .iter()
        .filter_map(|g| match GeoGeometry::try_from(g) {
            Ok(GeoGeometry::Polygon(poly)) => Some(Ok(poly)),
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
        .collect()
}

/// Extracts all Polygon parts (flattens MultiPolygon/GeometryCollection).
fn explode_polygons(g: Geometry) -> Vec<Geometry> {
    match g.geometry_type() {
        geos::GeometryTypes::Polygon => vec![g],
        geos::GeometryTypes::MultiPolygon | geos::GeometryTypes::GeometryCollection => {
            let n = g.get_num_geometries().unwrap_or(0);
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let Ok(sub) = g.get_geometry_n(i) else {
                    continue;
                };
                let sub: Geometry = sub.clone();
                out.extend(explode_polygons(sub));
            }
            out
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use geo::line_string;

    fn roads() -> LineLayer {
        LineLayer::new(
            "roadseg",
            vec![
                Feature::new("south", line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]),
                Feature::new("east-low", line_string![(x: 100.0, y: 0.0), (x: 100.0, y: 50.0)]),
                Feature::new("east-high", line_string![(x: 100.0, y: 50.0), (x: 100.0, y: 100.0)]),
                Feature::new("north", line_string![(x: 100.0, y: 100.0), (x: 0.0, y: 100.0)]),
                Feature::new("middle", line_string![(x: 0.0, y: 50.0), (x: 100.0, y: 50.0)]),
                Feature::new("spur", line_string![(x: 100.0, y: 100.0), (x: 150.0, y: 150.0)]),
            ],
        )
    }

    fn boundary() -> LineLayer {
        LineLayer::new(
            "ngd_al",
            vec![
                Feature::new("bo-low", line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 50.0)]),
                Feature::new("bo-high", line_string![(x: 0.0, y: 50.0), (x: 0.0, y: 100.0)]),
            ],
        )
    }

    #[test]
    fn open_network_forms_nothing() {
        let (_, sources, forming) = polygon_forming(&roads(), None, 0.01);
        assert_eq!(sources.len(), 6);
        assert!(forming.iter().all(|f| !f));
    }

    #[test]
    fn boundary_arcs_close_the_blocks() {
        let roads = roads();
        let boundary = boundary();
        let (_, sources, forming) = polygon_forming(&roads, Some(&boundary), 0.01);
        assert_eq!(forming, vec![true, true, true, true, true, false, true, true]);
        assert_eq!(sources[6].layer, "ngd_al");
    }

    #[test]
    fn polygonizes_two_blocks() {
        let roads = roads();
        let boundary = boundary();
        let result = build_meshblocks(&roads, Some(&boundary), 0.01).unwrap();
        let summary = result.summary();
        assert_eq!(summary.meshblock_count, 2);
        assert_eq!(summary.missing_count, 1);
        assert!((summary.total_area - 10_000.0).abs() < 1e-6);
        assert_eq!(result.missing_arcs[0].0.id, "spur");
    }

    #[test]
    fn zero_length_arc_does_not_form() {
        let mut roads = roads();
        roads
            .features
            .push(Feature::new("stub", line_string![(x: 50.0, y: 25.0), (x: 50.0, y: 25.0)]));
        let boundary = boundary();

        let (network, _, forming) = polygon_forming(&roads, Some(&boundary), 0.01);
        assert!(!network.graph.bridges()[6]);
        assert_eq!(forming, vec![true, true, true, true, true, false, false, true, true]);

        let result = build_meshblocks(&roads, Some(&boundary), 0.01).unwrap();
        let missing: Vec<&str> = result.missing_arcs.iter().map(|(source, _)| source.id.as_str()).collect();
        assert_eq!(missing, vec!["spur", "stub"]);
        assert_eq!(result.summary().meshblock_count, 2);
    }
}
