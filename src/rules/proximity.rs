use rayon::prelude::*;

use super::{Code, Finding, Rule, RuleInput};
use crate::geometry::{distance, point_segment_distance};
use crate::index::{PointIndex, segment_of};
use crate::node_key::NodeKey;

/// Undershoots: an arc that stops just short of another arc it never meets.
pub struct LineProximity;

impl Rule for LineProximity {
    fn code(&self) -> Code {
        Code::E205
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let network = input.lines()?;
        let arcs = network.arcs();
        let threshold = input.thresholds().line_proximity;
        let deadends: Vec<usize> = network.graph.deadends().collect();

        let flagged: Vec<usize> = deadends
            .par_iter()
            .filter_map(|&node| {
                let node = network.graph.node(node);
                let arc = node.incident[0].arc;
                let connected = network.graph.connected_arcs(arc);

                let too_close = network.index.within(node.location, threshold).any(|other| {
                    connected.binary_search(&other.0).is_err()
                        && point_segment_distance(node.location, &segment_of(arcs, other)) < threshold
                });
                too_close.then_some(arc)
            })
            .collect();

        Some(Finding::new(self.code(), flagged))
    }
}

pub struct PointProximity;

impl Rule for PointProximity {
    fn code(&self) -> Code {
        Code::E207
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let layer = input.points()?;
        let threshold = input.thresholds().point_proximity;
        let precision = input.thresholds().node_precision;
        let index = PointIndex::build(&layer.features);

        let mask: Vec<bool> = layer
            .features
            .par_iter()
            .map(|feature| {
                let here = feature.geometry.0;
                let key = NodeKey::new(here, precision);
                index.within(here, threshold).any(|j| {
                    let there = layer.features[j].geometry.0;
                    // stacked points belong to the duplicate check
                    NodeKey::new(there, precision) != key && distance(here, there) < threshold
                })
            })
            .collect();

        Some(Finding::from_mask(self.code(), &mask))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, flagged, network};
    use super::super::{RuleInput, Subject};
    use super::*;
    use crate::model::{Feature, PointLayer};
    use geo::{line_string, point};

    #[test]
    fn undershoot_is_flagged_but_connected_neighbours_are_not() {
        let network = network(vec![
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)],
            // stops 3 m short of arc 0
            line_string![(x: 50.0, y: 3.0), (x: 50.0, y: 50.0)],
            // joined to arc 0 at its end, with a dangling far end
            line_string![(x: 100.0, y: 0.0), (x: 102.0, y: 1.0)],
            // 20 m away from everything
            line_string![(x: 200.0, y: 20.0), (x: 300.0, y: 20.0)],
        ]);
        assert_eq!(flagged(&LineProximity, &network), vec![1]);
    }

    #[test]
    fn near_points_are_flagged() {
        let layer = PointLayer::new(
            "junction",
            vec![
                Feature::new("a", point!(x: 0.0, y: 0.0)),
                Feature::new("b", point!(x: 3.0, y: 0.0)),
                Feature::new("c", point!(x: 100.0, y: 0.0)),
                Feature::new("d", point!(x: 100.0, y: 0.0)),
            ],
        );
        let context = context();
        let input = RuleInput {
            subject: Subject::Points(&layer),
            neighbours: None,
            context: &context,
        };
        assert_eq!(PointProximity.evaluate(&input).unwrap().flagged, vec![0, 1]);
    }
}
