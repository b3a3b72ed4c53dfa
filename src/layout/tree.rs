use crate::ir::TreeNode;
use crate::scene::Point;

use super::{PlacedNode, TreeLayout};

/// Horizontal step multiplier applied at every level down.
pub const SHRINK_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSpacing {
    pub origin: Point,
    pub horizontal: f64,
    pub vertical: f64,
}

impl Default for TreeSpacing {
    fn default() -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            horizontal: 1.5,
            vertical: 1.0,
        }
    }
}

pub fn layout_tree(root: Option<&TreeNode>, spacing: TreeSpacing) -> TreeLayout {
    let mut layout = TreeLayout::default();
    if let Some(root) = root {
        place_node(
            root,
            spacing.origin,
            spacing.horizontal,
            spacing.vertical,
            0,
            &mut layout,
        );
    }
    layout
}

// Pre-order: the node, then the left edge and subtree, then the right edge and subtree.
fn place_node(
    node: &TreeNode,
    center: Point,
    dx: f64,
    dy: f64,
    depth: usize,
    out: &mut TreeLayout,
) {
    out.nodes.push(PlacedNode {
        label: node.value.to_string(),
        center,
        depth,
        horizontal_step: dx,
    });
    if let Some(left) = node.left.as_deref() {
        let child = Point::new(center.x - dx, center.y - dy);
        out.edges.push((center, child));
        place_node(left, child, dx * SHRINK_FACTOR, dy, depth + 1, out);
    }
    if let Some(right) = node.right.as_deref() {
        let child = Point::new(center.x + dx, center.y - dy);
        out.edges.push((center, child));
        place_node(right, child, dx * SHRINK_FACTOR, dy, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn sample_tree() -> TreeNode {
        TreeNode::with_children(
            8,
            Some(TreeNode::with_children(
                3,
                Some(TreeNode::leaf(1)),
                Some(TreeNode::leaf(6)),
            )),
            Some(TreeNode::with_children(10, None, Some(TreeNode::leaf(14)))),
        )
    }

    fn left_spine(depth: usize) -> TreeNode {
        let mut node = TreeNode::leaf(depth as i64);
        for value in (0..depth).rev() {
            node = TreeNode::with_children(value as i64, Some(node), None);
        }
        node
    }

    #[test]
    fn absent_root_emits_nothing() {
        let layout = layout_tree(None, TreeSpacing::default());
        assert!(layout.nodes.is_empty());
        assert!(layout.edges.is_empty());
    }

    #[test]
    fn nodes_are_emitted_in_preorder() {
        let tree = sample_tree();
        let layout = layout_tree(Some(&tree), TreeSpacing::default());
        let labels: Vec<&str> = layout.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, ["8", "3", "1", "6", "10", "14"]);
        assert_eq!(layout.edges.len(), 5);
    }

    #[test]
    fn children_offset_by_current_step() {
        let tree = sample_tree();
        let layout = layout_tree(Some(&tree), TreeSpacing::default());
        let find = |label: &str| {
            layout
                .nodes
                .iter()
                .find(|node| node.label == label)
                .map(|node| node.center)
                .unwrap()
        };
        assert_eq!(find("8"), Point::new(0.0, 0.0));
        assert_eq!(find("3"), Point::new(-1.5, -1.0));
        assert_eq!(find("10"), Point::new(1.5, -1.0));
        let one = find("1");
        assert!(approx_eq!(f64, one.x, -2.4, epsilon = 1e-9));
        assert!(approx_eq!(f64, one.y, -2.0));
        let fourteen = find("14");
        assert!(approx_eq!(f64, fourteen.x, 2.4, epsilon = 1e-9));
    }

    #[test]
    fn edges_start_at_parent_center() {
        let tree = TreeNode::with_children(1, Some(TreeNode::leaf(2)), None);
        let layout = layout_tree(Some(&tree), TreeSpacing::default());
        assert_eq!(
            layout.edges,
            vec![(Point::new(0.0, 0.0), Point::new(-1.5, -1.0))]
        );
    }

    proptest! {
        #[test]
        fn step_decays_geometrically_with_depth(depth in 0usize..12) {
            let tree = left_spine(depth);
            let spacing = TreeSpacing::default();
            let layout = layout_tree(Some(&tree), spacing);
            prop_assert_eq!(layout.nodes.len(), depth + 1);
            for node in &layout.nodes {
                let expected = spacing.horizontal * SHRINK_FACTOR.powi(node.depth as i32);
                prop_assert!(approx_eq!(f64, node.horizontal_step, expected, epsilon = 1e-12));
                prop_assert!(approx_eq!(
                    f64,
                    node.center.y,
                    -(node.depth as f64) * spacing.vertical,
                    epsilon = 1e-12
                ));
            }
        }
    }
}
