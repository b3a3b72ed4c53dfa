mod graph;
mod tree;

pub use graph::layout_graph;
pub use tree::{SHRINK_FACTOR, TreeSpacing, layout_tree};

use crate::ir::NodeId;
use crate::scene::Point;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    pub label: String,
    pub center: Point,
    pub depth: usize,
    /// Horizontal offset this node hands to its children.
    pub horizontal_step: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeLayout {
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<(Point, Point)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLayout {
    pub positions: IndexMap<NodeId, Point>,
    pub edges: Vec<GraphEdge>,
}
