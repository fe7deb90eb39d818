//! Topology and attribute validations.
//!
//! Every rule is an independent predicate over one layer. A rule flags
//! features by index and may also derive a reference layer (deadend points,
//! for instance) that helps whoever fixes the data.

mod attributes;
mod connectivity;
mod duplication;
mod measurement;
mod proximity;

use chrono::NaiveDate;
use geo::Point;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

use crate::config::Thresholds;
use crate::model::{LineLayer, PointLayer};
use crate::network::{LayerRole, LineNetwork};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Code {
    E101,
    E102,
    E103,
    E201,
    E202,
    E203,
    E204,
    E205,
    E206,
    E207,
    E208,
    E301,
    E401,
    E402,
    E403,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Lines,
    Points,
}

impl Code {
    pub const LINE_CODES: [Code; 13] = [
        Code::E101,
        Code::E103,
        Code::E201,
        Code::E202,
        Code::E203,
        Code::E204,
        Code::E205,
        Code::E206,
        Code::E208,
        Code::E301,
        Code::E401,
        Code::E402,
        Code::E403,
    ];

    pub const POINT_CODES: [Code; 5] = [Code::E102, Code::E207, Code::E401, Code::E402, Code::E403];

    pub fn description(&self) -> &'static str {
        match self {
            Code::E101 => "Arcs must not be duplicated.",
            Code::E102 => "Points must not be duplicated.",
            Code::E103 => "Arcs must not overlap (i.e. contain duplicated adjacent vertices).",
            Code::E201 => "Arcs must be simple (i.e. must not self-overlap, self-cross, nor touch their interior).",
            Code::E202 => "Arcs must only connect at endpoints (i.e. must be segmented at each intersection).",
            Code::E203 => "Arcs must be >= the minimum length.",
            Code::E204 => "Arcs must not have any vertices clustered within the clustering tolerance.",
            Code::E205 => "Arc endpoints must be >= the proximity distance from disjointed arcs.",
            Code::E206 => "Arcs must have >= the minimum merging angle.",
            Code::E207 => "Points must be >= the proximity distance from each other.",
            Code::E208 => "Ferry arcs must be connected to a road arc at one or more nodes.",
            Code::E301 => "Deadend nodes (reference only).",
            Code::E401 => "NID must be a 32 digit hexadecimal string.",
            Code::E402 => "Feature identifiers must be unique.",
            Code::E403 => "Dates must be valid YYYY[MM[DD]] values within range, with revdate >= credate.",
        }
    }

    pub fn applies_to(&self, target: Target) -> bool {
        match target {
            Target::Lines => Code::LINE_CODES.contains(self),
            Target::Points => Code::POINT_CODES.contains(self),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Settings every rule may read.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub thresholds: Thresholds,
    pub id_field: String,
    pub today: NaiveDate,
}

pub enum Subject<'a> {
    Lines(&'a LineNetwork),
    Points(&'a PointLayer),
}

impl Subject<'_> {
    pub fn target(&self) -> Target {
        match self {
            Subject::Lines(_) => Target::Lines,
            Subject::Points(_) => Target::Points,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Subject::Lines(network) => &network.layer.name,
            Subject::Points(layer) => &layer.name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Subject::Lines(network) => network.layer.len(),
            Subject::Points(layer) => layer.len(),
        }
    }

    pub fn id(&self, index: usize) -> &str {
        match self {
            Subject::Lines(network) => &network.layer.features[index].id,
            Subject::Points(layer) => &layer.features[index].id,
        }
    }
}

pub struct RuleInput<'a> {
    pub subject: Subject<'a>,
    /// Arcs of another layer the subject must relate to.
    pub neighbours: Option<&'a LineLayer>,
    pub context: &'a RuleContext,
}

impl RuleInput<'_> {
    pub fn lines(&self) -> Option<&LineNetwork> {
        match self.subject {
            Subject::Lines(network) => Some(network),
            Subject::Points(_) => None,
        }
    }

    pub fn points(&self) -> Option<&PointLayer> {
        match self.subject {
            Subject::Points(layer) => Some(layer),
            Subject::Lines(_) => None,
        }
    }

    pub fn role(&self) -> Option<LayerRole> {
        self.lines().map(|network| network.role)
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.context.thresholds
    }
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub code: Code,
    /// Indices into the subject layer, ascending.
    pub flagged: Vec<usize>,
    pub reference_points: Vec<Point<f64>>,
}

impl Finding {
    pub fn new(code: Code, mut flagged: Vec<usize>) -> Self {
        flagged.sort_unstable();
        flagged.dedup();
        Finding {
            code,
            flagged,
            reference_points: Vec::new(),
        }
    }

    pub fn from_mask(code: Code, mask: &[bool]) -> Self {
        let flagged = mask
            .iter()
            .enumerate()
            .filter(|(_, flag)| **flag)
            .map(|(i, _)| i)
            .collect();
        Finding::new(code, flagged)
    }
}

pub trait Rule: Sync {
    fn code(&self) -> Code;

    /// `None` when the rule cannot run on this input.
    fn evaluate(&self, input: &RuleInput) -> Option<Finding>;
}

static RULES: [&dyn Rule; 15] = [
    &duplication::DuplicateLines,
    &duplication::DuplicatePoints,
    &duplication::OverlappingLines,
    &connectivity::SelfIntersection,
    &connectivity::NonEndpointIntersection,
    &measurement::MinimumLength,
    &measurement::InternalClustering,
    &proximity::LineProximity,
    &measurement::MergingAngle,
    &proximity::PointProximity,
    &connectivity::FerryIntegration,
    &connectivity::Deadends,
    &attributes::NidFormat,
    &attributes::UniqueIds,
    &attributes::Dates,
];

/// Runs every rule applicable to the subject, in parallel. Findings come back
/// in code order regardless of scheduling.
pub fn run_all(input: &RuleInput) -> Vec<Finding> {
    run_rules(&RULES, input)
}

fn run_rules(rules: &[&dyn Rule], input: &RuleInput) -> Vec<Finding> {
    let target = input.subject.target();
    let mut findings: Vec<Finding> = rules
        .par_iter()
        .filter(|rule| rule.code().applies_to(target))
        .filter_map(|rule| rule.evaluate(input))
        .collect();
    findings.sort_by_key(|f| f.code);
    findings
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use geo::LineString;
    use crate::model::{Feature, LineFeature};
    use crate::network::{LayerRole, LineNetwork};

    pub fn context() -> RuleContext {
        RuleContext {
            thresholds: Thresholds::default(),
            id_field: "nid".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
    }

    pub fn network(arcs: Vec<LineString<f64>>) -> LineNetwork {
        let features: Vec<LineFeature> = arcs
            .into_iter()
            .enumerate()
            .map(|(i, geometry)| Feature::new(format!("arc{i}"), geometry))
            .collect();
        LineNetwork::new(LineLayer::new("roadseg", features), LayerRole::Road, 0.01)
    }

    pub fn flagged(rule: &dyn Rule, network: &LineNetwork) -> Vec<usize> {
        let context = context();
        let input = RuleInput {
            subject: Subject::Lines(network),
            neighbours: None,
            context: &context,
        };
        rule.evaluate(&input).map(|f| f.flagged).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::model::LineFeature;
    use geo::line_string;

    #[test]
    fn codes_split_by_target() {
        assert!(Code::E101.applies_to(Target::Lines));
        assert!(!Code::E101.applies_to(Target::Points));
        assert!(Code::E207.applies_to(Target::Points));
        assert!(Code::E401.applies_to(Target::Lines) && Code::E401.applies_to(Target::Points));
    }

    #[test]
    fn every_rule_has_a_distinct_code() {
        let mut codes: Vec<Code> = RULES.iter().map(|r| r.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), RULES.len());
    }

    #[test]
    fn clean_network_raises_nothing_but_deadends() {
        let mut network = network(vec![
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)],
            line_string![(x: 100.0, y: 0.0), (x: 100.0, y: 100.0)],
        ]);
        for (i, feature) in network.layer.features.iter_mut().enumerate() {
            feature.id = format!("{:032x}", i + 1);
        }
        let context = context();
        let input = RuleInput {
            subject: Subject::Lines(&network),
            neighbours: None,
            context: &context,
        };

        let findings = run_all(&input);
        let codes: Vec<Code> = findings.iter().map(|f| f.code).collect();
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
        assert!(!codes.contains(&Code::E208));
        for finding in &findings {
            assert!(finding.flagged.is_empty(), "{} flagged {:?}", finding.code, finding.flagged);
        }
        let deadends = findings.iter().find(|f| f.code == Code::E301).unwrap();
        assert_eq!(deadends.reference_points.len(), 2);
    }

    #[test]
    fn empty_layers_produce_empty_findings() {
        let context = context();
        let lines = LineNetwork::new(LineLayer::new("roadseg", Vec::<LineFeature>::new()), LayerRole::Road, 0.01);
        let points = PointLayer::new("junction", Vec::new());

        for subject in [Subject::Lines(&lines), Subject::Points(&points)] {
            let expected = match subject.target() {
                Target::Lines => Code::LINE_CODES.len() - 1,
                Target::Points => Code::POINT_CODES.len(),
            };
            let input = RuleInput {
                subject,
                neighbours: None,
                context: &context,
            };
            let findings = run_all(&input);
            assert_eq!(findings.len(), expected);
            for finding in &findings {
                assert!(finding.flagged.is_empty());
                assert!(finding.reference_points.is_empty());
            }
        }
    }

    #[test]
    fn rule_order_does_not_change_findings() {
        let network = network(vec![
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)],
            line_string![(x: 50.0, y: -50.0), (x: 50.0, y: 50.0)],
            line_string![(x: 100.0, y: 0.0), (x: 101.0, y: 0.0)],
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)],
            line_string![(x: 50.0, y: 53.0), (x: 50.0, y: 90.0)],
        ]);
        let context = context();
        let input = RuleInput {
            subject: Subject::Lines(&network),
            neighbours: None,
            context: &context,
        };

        let mut reversed: Vec<&dyn Rule> = RULES.to_vec();
        reversed.reverse();
        let summary = |findings: Vec<Finding>| -> Vec<(Code, Vec<usize>, usize)> {
            findings
                .into_iter()
                .map(|f| (f.code, f.flagged, f.reference_points.len()))
                .collect()
        };

        let forward = summary(run_all(&input));
        assert!(forward.iter().any(|(_, flagged, _)| !flagged.is_empty()));
        assert_eq!(forward, summary(run_rules(&reversed, &input)));
    }
}
