use tracing::debug;

use crate::graph::NodeGraph;
use crate::index::SegmentIndex;
use crate::model::{LineFeature, LineLayer};

/// What a line layer represents; a few rules only make sense for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Road,
    Ferry,
    Boundary,
}

impl LayerRole {
    pub fn label(&self) -> &'static str {
        match self {
            LayerRole::Road => "road",
            LayerRole::Ferry => "ferry",
            LayerRole::Boundary => "boundary",
        }
    }
}

/// A line layer together with its node graph and segment index.
pub struct LineNetwork {
    pub layer: LineLayer,
    pub role: LayerRole,
    pub graph: NodeGraph,
    pub index: SegmentIndex,
}

impl LineNetwork {
    pub fn new(layer: LineLayer, role: LayerRole, node_precision: f64) -> Self {
        let graph = NodeGraph::build(&layer.features, node_precision);
        let index = SegmentIndex::build(&layer.features);
        debug!(
            "{}: {} arcs, {} nodes, {} indexed segments",
            layer.name,
            layer.len(),
            graph.nodes().len(),
            index.len()
        );
        LineNetwork {
            layer,
            role,
            graph,
            index,
        }
    }

    pub fn arcs(&self) -> &[LineFeature] {
        &self.layer.features
    }
}
