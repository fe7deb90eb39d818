use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use rayon::prelude::*;
use std::collections::HashMap;

use super::{Code, Finding, Rule, RuleInput};
use crate::geometry::{segment_envelope, segment_length};
use crate::index::segment_of;
use crate::node_key::{NodeKey, coincident_groups};

pub struct DuplicateLines;

impl Rule for DuplicateLines {
    fn code(&self) -> Code {
        Code::E101
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let precision = input.thresholds().node_precision;

        let mut by_shape: HashMap<Vec<NodeKey>, Vec<usize>> = HashMap::new();
        for (i, feature) in network.arcs().iter().enumerate() {
            let forward: Vec<NodeKey> = feature
                .geometry
                .coords()
                .map(|c| NodeKey::new(*c, precision))
                .collect();
            let mut backward = forward.clone();
            backward.reverse();
            // same arc digitized in either direction
            let shape = forward.min(backward);
            by_shape.entry(shape).or_default().push(i);
        }

        let flagged = by_shape
            .into_values()
            .filter(|members| members.len() > 1)
            .flatten()
            .collect();
        Some(Finding::new(self.code(), flagged))
    }
}

pub struct DuplicatePoints;

impl Rule for DuplicatePoints {
    fn code(&self) -> Code {
        Code::E102
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let layer = input.points()?;
        let groups = coincident_groups(
            layer.features.iter().map(|f| f.geometry.0),
            input.thresholds().node_precision,
        );
        Some(Finding::new(self.code(), groups.into_iter().flatten().collect()))
    }
}

pub struct OverlappingLines;

impl Rule for OverlappingLines {
    fn code(&self) -> Code {
        Code::E103
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let arcs = network.arcs();
        let tolerance = input.thresholds().overlap_tolerance;

        let flagged: Vec<usize> = (0..arcs.len())
            .into_par_iter()
            .flat_map_iter(|a| {
                let mut pairs = Vec::new();
                for segment in arcs[a].geometry.lines() {
                    let envelope = segment_envelope(&segment, tolerance);
                    for other in network.index.intersecting(&envelope) {
                        if other.0 <= a {
                            continue;
                        }
                        let overlap = line_intersection(segment, segment_of(arcs, other));
                        if let Some(LineIntersection::Collinear { intersection }) = overlap {
                            if segment_length(&intersection) > tolerance {
                                pairs.push(a);
                                pairs.push(other.0);
                            }
                        }
                    }
                }
                pairs
            })
            .collect();

        Some(Finding::new(self.code(), flagged))
    }
}
