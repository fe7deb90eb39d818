use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, LineString, Point};
use geos::{Geom, Geometry};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{Code, Finding, Rule, RuleInput};
use crate::geometry::segment_envelope;
use crate::index::segment_of;
use crate::network::LayerRole;
use crate::node_key::NodeKey;

pub struct SelfIntersection;

impl Rule for SelfIntersection {
    fn code(&self) -> Code {
        Code::E201
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let mask: Vec<bool> = network
            .arcs()
            .par_iter()
            .map(|f| !is_simple(&f.geometry))
            .collect();
        Some(Finding::from_mask(self.code(), &mask))
    }
}

/// Simplicity as GEOS defines it: repeated vertices are ignored and a closed
/// arc may touch itself at its closing vertex only.
fn is_simple(line_string: &LineString) -> bool {
    match Geometry::try_from(line_string).and_then(|g| g.is_simple()) {
        Ok(simple) => simple,
        Err(e) => {
            // arcs GEOS cannot build (a single vertex) are left to the length check
            debug!("simplicity not evaluated: {}", e);
            true
        }
    }
}

pub struct NonEndpointIntersection;

impl Rule for NonEndpointIntersection {
    fn code(&self) -> Code {
        Code::E202
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let arcs = network.arcs();
        let precision = input.thresholds().node_precision;

        let endpoint_keys: Vec<[Option<NodeKey>; 2]> = arcs
            .iter()
            .map(|f| {
                [
                    f.geometry.0.first().map(|c| NodeKey::new(*c, precision)),
                    f.geometry.0.last().map(|c| NodeKey::new(*c, precision)),
                ]
            })
            .collect();
        let is_endpoint = |arc: usize, at: Coord| {
            let key = Some(NodeKey::new(at, precision));
            endpoint_keys[arc].contains(&key)
        };

        let flagged: Vec<usize> = (0..arcs.len())
            .into_par_iter()
            .flat_map_iter(|a| {
                let mut hits = Vec::new();
                for segment in arcs[a].geometry.lines() {
                    let envelope = segment_envelope(&segment, 0.0);
                    for other in network.index.intersecting(&envelope) {
                        if other.0 <= a {
                            continue;
                        }
                        let crossing = line_intersection(segment, segment_of(arcs, other));
                        if let Some(LineIntersection::SinglePoint { intersection, .. }) = crossing {
                            if !(is_endpoint(a, intersection) && is_endpoint(other.0, intersection)) {
                                hits.push(a);
                                hits.push(other.0);
                            }
                        }
                    }
                }
                hits
            })
            .collect();

        Some(Finding::new(self.code(), flagged))
    }
}

pub struct FerryIntegration;

impl Rule for FerryIntegration {
    fn code(&self) -> Code {
        Code::E208
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        if input.role()? != LayerRole::Ferry {
            return None;
        }
        let network = input.lines()?;
        let Some(roads) = input.neighbours else {
            warn!("{}: no road arcs supplied, skipping ferry integration", network.layer.name);
            return None;
        };
        let precision = input.thresholds().node_precision;

        let road_nodes: HashSet<NodeKey> = roads
            .features
            .iter()
            .flat_map(|f| [f.geometry.0.first(), f.geometry.0.last()])
            .flatten()
            .map(|c| NodeKey::new(*c, precision))
            .collect();

        let mask: Vec<bool> = network
            .arcs()
            .iter()
            .map(|ferry| {
                let ends = [ferry.geometry.0.first(), ferry.geometry.0.last()];
                !ends
                    .into_iter()
                    .flatten()
                    .any(|c| road_nodes.contains(&NodeKey::new(*c, precision)))
            })
            .collect();
        Some(Finding::from_mask(self.code(), &mask))
    }
}

pub struct Deadends;

impl Rule for Deadends {
    fn code(&self) -> Code {
        Code::E301
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let mut finding = Finding::new(self.code(), Vec::new());
        finding.reference_points = network
            .graph
            .deadends()
            .map(|node| Point::from(network.graph.node(node).location))
            .collect();
        Some(finding)
    }
}
