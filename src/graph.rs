use geo::Coord;
use std::collections::HashMap;

use crate::model::LineFeature;
use crate::node_key::{NodeKey, SnappedCoord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcEnd {
    pub arc: usize,
    pub at_start: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub location: Coord,
    pub incident: Vec<ArcEnd>,
}

impl Node {
    pub fn degree(&self) -> usize {
        self.incident.len()
    }
}

/// Arc endpoints merged into nodes by snapped position.
pub struct NodeGraph {
    nodes: Vec<Node>,
    by_key: HashMap<NodeKey, usize>,
    arc_nodes: Vec<Option<(usize, usize)>>,
}

impl NodeGraph {
    pub fn build(arcs: &[LineFeature], precision: f64) -> Self {
        let mut graph = NodeGraph {
            nodes: Vec::new(),
            by_key: HashMap::new(),
            arc_nodes: Vec::with_capacity(arcs.len()),
        };

        for (arc, feature) in arcs.iter().enumerate() {
            let coords = &feature.geometry.0;
            let (Some(first), Some(last)) = (coords.first(), coords.last()) else {
                graph.arc_nodes.push(None);
                continue;
            };
            if coords.len() < 2 {
                graph.arc_nodes.push(None);
                continue;
            }
            let start = graph.attach(SnappedCoord::new(*first, precision), ArcEnd { arc, at_start: true });
            let end = graph.attach(SnappedCoord::new(*last, precision), ArcEnd { arc, at_start: false });
            graph.arc_nodes.push(Some((start, end)));
        }
        graph
    }

    fn attach(&mut self, snapped: SnappedCoord, end: ArcEnd) -> usize {
        let next_id = self.nodes.len();
        let id = *self.by_key.entry(snapped.key()).or_insert(next_id);
        if id == next_id {
            self.nodes.push(Node {
                location: snapped.original(),
                incident: Vec::new(),
            });
        }
        self.nodes[id].incident.push(end);
        id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    /// Start and end node of an arc; `None` for arcs with fewer than two vertices.
    pub fn arc_nodes(&self, arc: usize) -> Option<(usize, usize)> {
        self.arc_nodes.get(arc).copied().flatten()
    }

    pub fn deadends(&self) -> impl Iterator<Item = usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.degree() == 1)
            .map(|(id, _)| id)
    }

    /// Arcs that share a node with `arc`, including `arc` itself.
    pub fn connected_arcs(&self, arc: usize) -> Vec<usize> {
        let Some((start, end)) = self.arc_nodes(arc) else {
            return vec![arc];
        };
        let mut arcs: Vec<usize> = self.nodes[start]
            .incident
            .iter()
            .chain(self.nodes[end].incident.iter())
            .map(|e| e.arc)
            .collect();
        arcs.sort_unstable();
        arcs.dedup();
        arcs
    }

    /// Marks every arc whose removal would split its two end nodes apart.
    /// Parallel arcs protect each other and closed arcs are never bridges.
    pub fn bridges(&self) -> Vec<bool> {
        let arc_count = self.arc_nodes.len();
        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); self.nodes.len()];
        for (arc, nodes) in self.arc_nodes.iter().enumerate() {
            if let Some((a, b)) = *nodes {
                if a != b {
                    adjacency[a].push((b, arc));
                    adjacency[b].push((a, arc));
                }
            }
        }

        let mut is_bridge = vec![false; arc_count];
        let mut discovered = vec![usize::MAX; self.nodes.len()];
        let mut low = vec![0usize; self.nodes.len()];
        let mut timer = 0;
        // (node, arc used to reach it, next adjacency slot to visit)
        let mut stack: Vec<(usize, Option<usize>, usize)> = Vec::new();

        for root in 0..self.nodes.len() {
            if discovered[root] != usize::MAX {
                continue;
            }
            discovered[root] = timer;
            low[root] = timer;
            timer += 1;
            stack.push((root, None, 0));

            while let Some(top) = stack.last_mut() {
                let (v, via) = (top.0, top.1);
                if top.2 < adjacency[v].len() {
                    let (w, arc) = adjacency[v][top.2];
                    top.2 += 1;
                    if Some(arc) == via {
                        continue;
                    }
                    if discovered[w] == usize::MAX {
                        discovered[w] = timer;
                        low[w] = timer;
                        timer += 1;
                        stack.push((w, Some(arc), 0));
                    } else {
                        low[v] = low[v].min(discovered[w]);
                    }
                } else {
                    stack.pop();
                    if let (Some(&(parent, _, _)), Some(arc)) = (stack.last(), via) {
                        low[parent] = low[parent].min(low[v]);
                        if low[v] > discovered[parent] {
                            is_bridge[arc] = true;
                        }
                    }
                }
            }
        }
        is_bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use geo::line_string;

    fn arcs() -> Vec<LineFeature> {
        // a unit square with a tail hanging off one corner and a doubled edge
        vec![
            Feature::new("s0", line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
            Feature::new("s1", line_string![(x: 10.0, y: 0.0), (x: 10.0, y: 10.0)]),
            Feature::new("s2", line_string![(x: 10.0, y: 10.0), (x: 0.0, y: 10.0)]),
            Feature::new("s3", line_string![(x: 0.0, y: 10.0), (x: 0.0, y: 0.0)]),
            Feature::new("tail", line_string![(x: 10.0, y: 10.0), (x: 20.0, y: 20.0)]),
            Feature::new("p0", line_string![(x: 20.0, y: 20.0), (x: 30.0, y: 20.0)]),
            Feature::new("p1", line_string![(x: 20.0, y: 20.0), (x: 25.0, y: 25.0), (x: 30.0, y: 20.0)]),
            Feature::new("loop", line_string![(x: 50.0, y: 0.0), (x: 60.0, y: 0.0), (x: 55.0, y: 5.0), (x: 50.0, y: 0.0)]),
        ]
    }

    #[test]
    fn merges_endpoints_into_nodes() {
        let graph = NodeGraph::build(&arcs(), 0.01);
        assert_eq!(graph.nodes().len(), 7);
        let (start, _) = graph.arc_nodes(1).unwrap();
        assert_eq!(graph.node(start).degree(), 2);
        let (_, end) = graph.arc_nodes(1).unwrap();
        assert_eq!(graph.node(end).degree(), 3);
        assert_eq!(graph.connected_arcs(4), vec![1, 2, 4, 5, 6]);
    }

    #[test]
    fn only_the_tail_is_a_bridge() {
        let graph = NodeGraph::build(&arcs(), 0.01);
        let bridges = graph.bridges();
        assert_eq!(bridges, vec![false, false, false, false, true, false, false, false]);
    }

    #[test]
    fn dangling_arc_ends_are_deadends() {
        let mut arcs = arcs();
        arcs.push(Feature::new("dangle", line_string![(x: 0.0, y: 0.0), (x: -5.0, y: -5.0)]));
        let graph = NodeGraph::build(&arcs, 0.01);
        let deadends: Vec<_> = graph.deadends().map(|n| graph.node(n).location).collect();
        assert_eq!(deadends, vec![geo::coord! { x: -5.0, y: -5.0 }]);
        assert!(graph.bridges()[8]);
    }
}
