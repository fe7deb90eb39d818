use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

use crate::config::ConflationConfig;
use crate::geometry::{densify, point_line_string_distance, segment_envelope};
use crate::index::SegmentIndex;
use crate::model::{LineFeature, LineLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:1")]
    ManyToOne,
    #[serde(rename = "M:N")]
    ManyToMany,
    #[serde(rename = "1:0")]
    SourceOnly,
    #[serde(rename = "0:1")]
    TargetOnly,
}

impl Cardinality {
    fn of_component(sources: usize, targets: usize) -> Self {
        match (sources, targets) {
            (_, 0) => Cardinality::SourceOnly,
            (0, _) => Cardinality::TargetOnly,
            (1, 1) => Cardinality::OneToOne,
            (1, _) => Cardinality::OneToMany,
            (_, 1) => Cardinality::ManyToOne,
            _ => Cardinality::ManyToMany,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:N",
            Cardinality::ManyToOne => "N:1",
            Cardinality::ManyToMany => "M:N",
            Cardinality::SourceOnly => "1:0",
            Cardinality::TargetOnly => "0:1",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcMatch {
    pub id: String,
    pub class: Cardinality,
    pub component: usize,
    /// Ids of the arcs on the other side this arc was matched with.
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflationResult {
    pub source: Vec<ArcMatch>,
    pub target: Vec<ArcMatch>,
    pub counts: BTreeMap<Cardinality, usize>,
}

/// Share of `arc`'s samples lying within `tolerance` of `other`.
fn coverage(arc: &LineFeature, other: &LineFeature, tolerance: f64) -> f64 {
    let samples = densify(&arc.geometry, tolerance / 2.0);
    if samples.is_empty() {
        return 0.0;
    }
    let near = samples
        .iter()
        .filter(|c| point_line_string_distance(**c, &other.geometry) <= tolerance)
        .count();
    near as f64 / samples.len() as f64
}

fn is_match(a: &LineFeature, b: &LineFeature, config: &ConflationConfig) -> bool {
    coverage(b, a, config.tolerance) >= config.min_overlap_ratio
        || coverage(a, b, config.tolerance) >= config.min_overlap_ratio
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        DisjointSet {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Pairs every source arc with the target arcs that follow it, then classifies
/// each connected group of matched arcs by how many arcs it holds per side.
pub fn conflate(source: &LineLayer, target: &LineLayer, config: &ConflationConfig) -> ConflationResult {
    let target_index = SegmentIndex::build(&target.features);

    let edges: Vec<(usize, usize)> = source
        .features
        .par_iter()
        .enumerate()
        .progress_count(source.len() as u64)
        .flat_map_iter(|(a, arc)| {
            let candidates: BTreeSet<usize> = arc
                .geometry
                .lines()
                .flat_map(|segment| {
                    target_index
                        .intersecting(&segment_envelope(&segment, config.tolerance))
                        .map(|(b, _)| b)
                        .collect::<Vec<_>>()
                })
                .collect();
            candidates
                .into_iter()
                .filter(|&b| is_match(arc, &target.features[b], config))
                .map(move |b| (a, b))
                .collect::<Vec<_>>()
        })
        .collect();

    info!(
        "{} source arcs and {} target arcs share {} matches",
        source.len(),
        target.len(),
        edges.len()
    );

    let offset = source.len();
    let mut components = DisjointSet::new(offset + target.len());
    let mut source_matches: Vec<Vec<String>> = vec![Vec::new(); source.len()];
    let mut target_matches: Vec<Vec<String>> = vec![Vec::new(); target.len()];
    for &(a, b) in &edges {
        components.union(a, offset + b);
        source_matches[a].push(target.features[b].id.clone());
        target_matches[b].push(source.features[a].id.clone());
    }

    let roots: Vec<usize> = (0..offset + target.len()).map(|i| components.find(i)).collect();
    let mut members: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for (i, root) in roots.iter().enumerate() {
        let entry = members.entry(*root).or_default();
        if i < offset {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }
    // number components densely, in order of their first member
    let component_ids: BTreeMap<usize, usize> = members.keys().enumerate().map(|(id, root)| (*root, id)).collect();

    let classify = |i: usize, id: &str, matches: Vec<String>| {
        let (sources, targets) = members[&roots[i]];
        ArcMatch {
            id: id.to_string(),
            class: Cardinality::of_component(sources, targets),
            component: component_ids[&roots[i]],
            matches,
        }
    };

    let source_result: Vec<ArcMatch> = source
        .features
        .iter()
        .zip(source_matches)
        .enumerate()
        .map(|(i, (f, matches))| classify(i, &f.id, matches))
        .collect();
    let target_result: Vec<ArcMatch> = target
        .features
        .iter()
        .zip(target_matches)
        .enumerate()
        .map(|(j, (f, matches))| classify(offset + j, &f.id, matches))
        .collect();

    let mut counts: BTreeMap<Cardinality, usize> = BTreeMap::new();
    for arc in source_result.iter().chain(&target_result) {
        *counts.entry(arc.class).or_default() += 1;
    }
    for (class, count) in &counts {
        info!("{}: {} arcs", class, count);
    }

    ConflationResult {
        source: source_result,
        target: target_result,
        counts,
    }
}
