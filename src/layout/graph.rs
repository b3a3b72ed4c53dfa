use indexmap::IndexMap;
use log::trace;

use crate::ir::{Adjacency, NodeId};
use crate::scene::Point;

use super::{GraphEdge, GraphLayout};

/// Places nodes evenly on the unit circle in adjacency order.
/// Returns `None` for an empty graph.
pub fn layout_graph(adj: &Adjacency) -> Option<GraphLayout> {
    let n = adj.len();
    if n == 0 {
        return None;
    }

    let mut positions: IndexMap<NodeId, Point> = IndexMap::with_capacity(n);
    for (i, node) in adj.keys().enumerate() {
        let angle = std::f64::consts::TAU * i as f64 / n as f64;
        positions.insert(node.clone(), Point::new(angle.cos(), angle.sin()));
    }

    let mut edges = Vec::new();
    for (node, neighbors) in adj {
        let start = positions[node];
        for neighbor in neighbors {
            let Some(end) = positions.get(neighbor) else {
                trace!(node:% = node, neighbor:% = neighbor; "Skipping edge to unknown node");
                continue;
            };
            edges.push(GraphEdge {
                from: node.clone(),
                to: neighbor.clone(),
                start,
                end: *end,
            });
        }
    }

    Some(GraphLayout { positions, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn adjacency(entries: &[(&str, &[&str])]) -> Adjacency {
        entries
            .iter()
            .map(|(node, neighbors)| {
                (
                    NodeId::from(*node),
                    neighbors.iter().map(|n| NodeId::from(*n)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn empty_graph_has_no_layout() {
        assert!(layout_graph(&Adjacency::new()).is_none());
    }

    #[test]
    fn single_node_sits_at_angle_zero() {
        let layout = layout_graph(&adjacency(&[("A", &[])])).unwrap();
        assert_eq!(layout.positions[&NodeId::from("A")], Point::new(1.0, 0.0));
        assert!(layout.edges.is_empty());
    }

    #[test]
    fn unknown_neighbors_are_skipped() {
        let adj = adjacency(&[("A", &["B", "Z"]), ("B", &["missing"])]);
        let layout = layout_graph(&adj).unwrap();
        assert_eq!(layout.edges.len(), 1);
        assert_eq!(layout.edges[0].from, NodeId::from("A"));
        assert_eq!(layout.edges[0].to, NodeId::from("B"));
    }

    #[test]
    fn reciprocal_adjacency_emits_both_edges() {
        let adj = adjacency(&[("A", &["B"]), ("B", &["A"]), ("C", &["A", "A"])]);
        let layout = layout_graph(&adj).unwrap();
        let owned: Vec<(String, String)> = layout
            .edges
            .iter()
            .map(|edge| (edge.from.to_string(), edge.to.to_string()))
            .collect();
        let pairs: Vec<(&str, &str)> = owned
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        assert_eq!(pairs, [("A", "B"), ("B", "A"), ("C", "A"), ("C", "A")]);
        assert_eq!(layout.edges[0].start, layout.edges[1].end);
    }

    #[test]
    fn integer_and_string_ids_do_not_match() {
        let mut adj = Adjacency::new();
        adj.insert(NodeId::from(1), vec![NodeId::from("1"), NodeId::from(2)]);
        adj.insert(NodeId::from("1"), vec![NodeId::from(1)]);
        adj.insert(NodeId::from(2), vec![]);
        let layout = layout_graph(&adj).unwrap();
        assert_eq!(layout.positions.len(), 3);
        let pairs: Vec<(&NodeId, &NodeId)> =
            layout.edges.iter().map(|edge| (&edge.from, &edge.to)).collect();
        assert_eq!(
            pairs,
            [
                (&NodeId::from(1), &NodeId::from("1")),
                (&NodeId::from(1), &NodeId::from(2)),
                (&NodeId::from("1"), &NodeId::from(1)),
            ]
        );
        assert!(layout.edges.iter().all(|edge| edge.start != edge.end));
    }

    #[test]
    fn positions_follow_insertion_order() {
        let adj = adjacency(&[("z", &[]), ("a", &[]), ("m", &[]), ("b", &[])]);
        let layout = layout_graph(&adj).unwrap();
        let order: Vec<String> = layout.positions.keys().map(NodeId::to_string).collect();
        assert_eq!(order, ["z", "a", "m", "b"]);
        let a = layout.positions[&NodeId::from("a")];
        assert!(approx_eq!(f64, a.x, 0.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, a.y, 1.0, epsilon = 1e-12));
    }

    proptest! {
        #[test]
        fn nodes_lie_evenly_on_unit_circle(n in 1usize..40) {
            let adj: Adjacency = (0..n).map(|i| (NodeId::Int(i as i64), Vec::new())).collect();
            let layout = layout_graph(&adj).unwrap();
            for (i, point) in layout.positions.values().enumerate() {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                prop_assert!(approx_eq!(f64, point.x, angle.cos(), epsilon = 1e-12));
                prop_assert!(approx_eq!(f64, point.y, angle.sin(), epsilon = 1e-12));
            }
        }
    }
}
