use geo::{Coord, LineString};
use rayon::prelude::*;

use super::{Code, Finding, Rule, RuleInput};
use crate::geometry::{angle_between, bearing, distance, planar_length};
use crate::graph::ArcEnd;
use crate::index::PointIndex;

pub struct MinimumLength;

impl Rule for MinimumLength {
    fn code(&self) -> Code {
        Code::E203
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let min_length = input.thresholds().min_arc_length;
        let mask: Vec<bool> = network
            .arcs()
            .par_iter()
            .map(|f| planar_length(&f.geometry) < min_length)
            .collect();
        Some(Finding::from_mask(self.code(), &mask))
    }
}

pub struct InternalClustering;

impl Rule for InternalClustering {
    fn code(&self) -> Code {
        Code::E204
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let tolerance = input.thresholds().cluster_tolerance;
        let mask: Vec<bool> = network
            .arcs()
            .par_iter()
            .map(|f| has_clustered_vertices(&f.geometry, tolerance))
            .collect();
        Some(Finding::from_mask(self.code(), &mask))
    }
}

fn has_clustered_vertices(line_string: &LineString, tolerance: f64) -> bool {
    let coords = &line_string.0;
    let last = coords.len().saturating_sub(1);
    let closed = coords.len() > 2 && line_string.is_closed();
    let index = PointIndex::from_coords(coords.iter().copied());

    coords.iter().enumerate().any(|(i, here)| {
        index.within(*here, tolerance).any(|j| {
            let closure = closed && i.min(j) == 0 && i.max(j) == last;
            j != i && !closure && distance(*here, coords[j]) < tolerance
        })
    })
}

pub struct MergingAngle;

impl Rule for MergingAngle {
    fn code(&self) -> Code {
        Code::E206
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let arcs = network.arcs();
        let min_angle = input.thresholds().min_merging_angle;

        let flagged: Vec<usize> = network
            .graph
            .nodes()
            .par_iter()
            .filter(|node| node.degree() > 1)
            .flat_map_iter(|node| {
                let leaving: Vec<(usize, f64)> = node
                    .incident
                    .iter()
                    .filter_map(|end| departure_bearing(&arcs[end.arc].geometry, *end).map(|b| (end.arc, b)))
                    .collect();

                let mut hits = Vec::new();
                for (i, (arc_a, bearing_a)) in leaving.iter().enumerate() {
                    for (arc_b, bearing_b) in &leaving[i + 1..] {
                        if angle_between(*bearing_a, *bearing_b) < min_angle {
                            hits.push(*arc_a);
                            hits.push(*arc_b);
                        }
                    }
                }
                hits
            })
            .collect();

        Some(Finding::new(self.code(), flagged))
    }
}

/// Direction an arc takes when leaving the given end, skipping repeated vertices.
fn departure_bearing(line_string: &LineString, end: ArcEnd) -> Option<f64> {
    let coords: &[Coord] = &line_string.0;
    let origin = if end.at_start { coords.first()? } else { coords.last()? };
    let next = if end.at_start {
        coords.iter().find(|c| *c != origin)
    } else {
        coords.iter().rev().find(|c| *c != origin)
    }?;
    Some(bearing(*origin, *next))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{flagged, network};
    use super::*;
    use geo::line_string;

    #[test]
    fn short_arcs_are_flagged() {
        let network = network(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 3.5)],
            line_string![(x: 5.0, y: 5.0)],
        ]);
        assert_eq!(flagged(&MinimumLength, &network), vec![0, 2]);
    }

    #[test]
    fn clustered_vertices_are_flagged() {
        let network = network(vec![
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.005, y: 0.0), (x: 20.0, y: 0.0)],
            // revisits its own vertex away from the closure
            line_string![(x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 20.0), (x: 10.0, y: 10.0), (x: 20.0, y: 10.0)],
            line_string![(x: 0.0, y: 30.0), (x: 10.0, y: 30.0), (x: 5.0, y: 40.0), (x: 0.0, y: 30.0)],
        ]);
        assert_eq!(flagged(&InternalClustering, &network), vec![0, 1]);
    }

    #[test]
    fn long_arc_clusters_are_found_through_the_index() {
        let mut coords: Vec<(f64, f64)> = (0..5000).map(|i| (i as f64, (i % 7) as f64)).collect();
        assert!(!has_clustered_vertices(&LineString::from(coords.clone()), 0.01));

        coords.insert(4000, (3999.004, 3999.0 % 7.0));
        assert!(has_clustered_vertices(&LineString::from(coords), 0.01));
    }

    #[test]
    fn sharp_merges_are_flagged() {
        let network = network(vec![
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)],
            // leaves the shared node 2 degrees off the first arc
            line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 99.94, y: 3.49)],
            line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 100.0)],
        ]);
        assert_eq!(flagged(&MergingAngle, &network), vec![0, 1]);
    }

    #[test]
    fn bearing_skips_repeated_vertices() {
        let ls = line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 0.0, y: 5.0)];
        let start = departure_bearing(&ls, ArcEnd { arc: 0, at_start: true }).unwrap();
        let end = departure_bearing(&ls, ArcEnd { arc: 0, at_start: false }).unwrap();
        assert!((start - 90.0).abs() < 1e-9);
        assert!((end - 270.0).abs() < 1e-9);
    }
}
