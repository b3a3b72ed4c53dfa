//! One drawing function per data-structure kind.
//!
//! Each call maps its input to primitives on a single [`Surface`] and
//! presents it. The input is never modified.

use log::debug;
use thiserror::Error;

use crate::ir::{Adjacency, Element, TreeNode};
use crate::layout::{TreeSpacing, layout_graph, layout_tree};
use crate::scene::{DiagramKind, Frame, Primitive, Scene};
use crate::sink::{DisplaySink, Surface};
use crate::theme::Theme;

const BAR_WIDTH: f64 = 0.8;

pub const DEFAULT_ARRAY_TITLE: &str = "Array";
pub const DEFAULT_STACK_TITLE: &str = "Stack (top on right)";
pub const DEFAULT_QUEUE_TITLE: &str = "Queue (front on left)";
pub const DEFAULT_SORT_TITLE: &str = "Sorting Snapshot";
pub const DEFAULT_SEARCH_TITLE: &str = "Search";
pub const DEFAULT_TREE_TITLE: &str = "Tree";
pub const DEFAULT_GRAPH_TITLE: &str = "Graph";

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("value at index {index} is not a number: '{value}'")]
    NotNumeric { index: usize, value: String },
    #[error("value at index {index} is not finite: {value}")]
    NonFinite { index: usize, value: f64 },
    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

pub struct Toolkit<'s> {
    sink: &'s mut dyn DisplaySink,
    theme: Theme,
}

impl<'s> Toolkit<'s> {
    pub fn new(sink: &'s mut dyn DisplaySink, theme: Theme) -> Self {
        Self { sink, theme }
    }

    pub fn draw_array(
        &mut self,
        values: &[Element],
        highlight_index: Option<i64>,
        title: &str,
    ) -> Result<(), DrawError> {
        let colors = self.highlight_colors(values.len(), highlight_index);
        self.draw_bars(DiagramKind::Array, values, colors, title)
    }

    pub fn draw_stack(&mut self, values: &[Element], title: &str) -> Result<(), DrawError> {
        let color = self.theme.stack_color.clone();
        self.draw_cells(DiagramKind::Stack, values, &color, title)
    }

    pub fn draw_queue(&mut self, values: &[Element], title: &str) -> Result<(), DrawError> {
        let color = self.theme.queue_color.clone();
        self.draw_cells(DiagramKind::Queue, values, &color, title)
    }

    pub fn draw_sort(&mut self, values: &[Element], title: &str) -> Result<(), DrawError> {
        let colors = vec![self.theme.sort_color.clone(); values.len()];
        self.draw_bars(DiagramKind::Sort, values, colors, title)
    }

    pub fn draw_search(
        &mut self,
        values: &[Element],
        index: Option<i64>,
        title: &str,
    ) -> Result<(), DrawError> {
        let colors = self.highlight_colors(values.len(), index);
        self.draw_bars(DiagramKind::Search, values, colors, title)
    }

    pub fn draw_tree(&mut self, root: Option<&TreeNode>, title: &str) -> Result<(), DrawError> {
        let layout = layout_tree(root, TreeSpacing::default());
        debug!(nodes = layout.nodes.len(), edges = layout.edges.len(); "Tree laid out");
        let edge_color = self.theme.tree_edge_color.clone();
        let scene = self.scene(DiagramKind::Tree, title, Frame::Hidden);
        let mut surface = Surface::acquire(&mut *self.sink, scene)?;
        for (from, to) in layout.edges {
            surface.push(Primitive::Segment {
                from,
                to,
                color: edge_color.clone(),
            });
        }
        for node in layout.nodes {
            surface.push(Primitive::NodeMarker {
                center: node.center,
                label: node.label,
            });
        }
        surface.present()?;
        Ok(())
    }

    /// An empty graph draws nothing and acquires no surface.
    pub fn draw_graph(&mut self, adj: &Adjacency, title: &str) -> Result<(), DrawError> {
        let Some(layout) = layout_graph(adj) else {
            debug!(title:% = title; "Empty graph, nothing to draw");
            return Ok(());
        };
        let edge_color = self.theme.graph_edge_color.clone();
        let scene = self.scene(DiagramKind::Graph, title, Frame::Hidden);
        let mut surface = Surface::acquire(&mut *self.sink, scene)?;
        for edge in layout.edges {
            surface.push(Primitive::Segment {
                from: edge.start,
                to: edge.end,
                color: edge_color.clone(),
            });
        }
        for (id, center) in layout.positions {
            surface.push(Primitive::NodeMarker {
                center,
                label: id.to_string(),
            });
        }
        surface.present()?;
        Ok(())
    }

    fn scene(&self, kind: DiagramKind, title: &str, frame: Frame) -> Scene {
        Scene::new(kind, title, self.theme.figure_size(kind), frame)
    }

    fn highlight_colors(&self, len: usize, highlight_index: Option<i64>) -> Vec<String> {
        let mut colors = vec![self.theme.bar_color.clone(); len];
        let highlighted = highlight_index
            .and_then(|index| usize::try_from(index).ok())
            .filter(|index| *index < len);
        if let Some(index) = highlighted {
            colors[index] = self.theme.accent_color.clone();
        }
        colors
    }

    fn draw_bars(
        &mut self,
        kind: DiagramKind,
        values: &[Element],
        colors: Vec<String>,
        title: &str,
    ) -> Result<(), DrawError> {
        let frame = Frame::Axes {
            ticks: values.len(),
            show_y: true,
        };
        let scene = self.scene(kind, title, frame);
        let mut surface = Surface::acquire(&mut *self.sink, scene)?;
        for (index, (value, color)) in values.iter().zip(colors).enumerate() {
            let height = value.as_number().ok_or_else(|| DrawError::NotNumeric {
                index,
                value: value.to_string(),
            })?;
            if !height.is_finite() {
                return Err(DrawError::NonFinite {
                    index,
                    value: height,
                });
            }
            surface.push(Primitive::Bar {
                x: index as f64,
                height,
                width: BAR_WIDTH,
                color,
            });
        }
        surface.present()?;
        Ok(())
    }

    fn draw_cells(
        &mut self,
        kind: DiagramKind,
        values: &[Element],
        color: &str,
        title: &str,
    ) -> Result<(), DrawError> {
        let frame = Frame::Axes {
            ticks: values.len(),
            show_y: false,
        };
        let scene = self.scene(kind, title, frame);
        let mut surface = Surface::acquire(&mut *self.sink, scene)?;
        for index in 0..values.len() {
            surface.push(Primitive::Bar {
                x: index as f64,
                height: 1.0,
                width: BAR_WIDTH,
                color: color.to_string(),
            });
        }
        for (index, value) in values.iter().enumerate() {
            surface.push(Primitive::Label {
                x: index as f64,
                y: 0.5,
                text: value.to_string(),
            });
        }
        surface.present()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Point;
    use crate::sink::RecordingSink;
    use proptest::prelude::*;

    fn numbers(values: &[f64]) -> Vec<Element> {
        values.iter().copied().map(Element::Number).collect()
    }

    #[test]
    fn array_highlights_single_bar() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        kit.draw_array(&numbers(&[4.0, 2.0, 7.0]), Some(1), "Array")
            .unwrap();
        let scene = sink.last().unwrap();
        assert_eq!(scene.kind, DiagramKind::Array);
        assert_eq!(scene.bar_colors(), ["#4C78A8", "#F58518", "#4C78A8"]);
        assert_eq!(sink.open_surfaces(), 0);
    }

    #[test]
    fn stack_and_queue_label_every_cell() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        let values = vec![Element::from(1_i64), Element::from("top")];
        kit.draw_stack(&values, DEFAULT_STACK_TITLE).unwrap();
        kit.draw_queue(&values, DEFAULT_QUEUE_TITLE).unwrap();
        let stack = &sink.scenes[0];
        let queue = &sink.scenes[1];
        assert_eq!(stack.bar_colors(), ["#54A24B", "#54A24B"]);
        assert_eq!(queue.bar_colors(), ["#E45756", "#E45756"]);
        assert!(stack.primitives.contains(&Primitive::Label {
            x: 1.0,
            y: 0.5,
            text: "top".to_string()
        }));
        assert_eq!(stack.frame, Frame::Axes { ticks: 2, show_y: false });
    }

    #[test]
    fn sort_uses_single_color_and_taller_figure() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        kit.draw_sort(&numbers(&[3.0, 1.0]), DEFAULT_SORT_TITLE)
            .unwrap();
        let scene = sink.last().unwrap();
        assert_eq!(scene.bar_colors(), ["#72B7B2", "#72B7B2"]);
        assert_eq!(scene.size.height, 3.0);
    }

    #[test]
    fn non_numeric_bar_fails_and_releases_surface() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        let values = vec![Element::from(1_i64), Element::from("x")];
        let err = kit.draw_sort(&values, "bad").unwrap_err();
        assert!(matches!(err, DrawError::NotNumeric { index: 1, .. }));
        assert!(sink.scenes.is_empty());
        assert_eq!(sink.acquired, 1);
        assert_eq!(sink.open_surfaces(), 0);
    }

    #[test]
    fn non_finite_bar_fails() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        let err = kit
            .draw_array(&numbers(&[1.0, f64::NAN]), None, "nan")
            .unwrap_err();
        assert!(matches!(err, DrawError::NonFinite { index: 1, .. }));
        assert_eq!(sink.open_surfaces(), 0);
    }

    #[test]
    fn absent_tree_presents_empty_titled_surface() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        kit.draw_tree(None, "Empty").unwrap();
        let scene = sink.last().unwrap();
        assert_eq!(scene.title, "Empty");
        assert!(scene.primitives.is_empty());
    }

    #[test]
    fn tree_edges_precede_markers() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        let tree = TreeNode::with_children(1, Some(TreeNode::leaf(2)), Some(TreeNode::leaf(3)));
        kit.draw_tree(Some(&tree), DEFAULT_TREE_TITLE).unwrap();
        let scene = sink.last().unwrap();
        assert!(matches!(scene.primitives[0], Primitive::Segment { .. }));
        assert!(matches!(scene.primitives[1], Primitive::Segment { .. }));
        let markers: Vec<(Point, &str)> = scene.markers().collect();
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0], (Point::new(0.0, 0.0), "1"));
    }

    #[test]
    fn empty_graph_presents_nothing() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        kit.draw_graph(&Adjacency::new(), DEFAULT_GRAPH_TITLE).unwrap();
        assert_eq!(sink.acquired, 0);
        assert!(sink.scenes.is_empty());
    }

    #[test]
    fn graph_skips_unknown_neighbors() {
        let mut sink = RecordingSink::new();
        let mut kit = Toolkit::new(&mut sink, Theme::classic());
        let mut adj = Adjacency::new();
        adj.insert("A".into(), vec!["B".into(), "Q".into()]);
        adj.insert("B".into(), vec!["A".into()]);
        kit.draw_graph(&adj, DEFAULT_GRAPH_TITLE).unwrap();
        let scene = sink.last().unwrap();
        assert_eq!(scene.segments().count(), 2);
        assert_eq!(scene.markers().count(), 2);
        let last_segment = scene
            .primitives
            .iter()
            .rposition(|p| matches!(p, Primitive::Segment { .. }))
            .unwrap();
        let first_marker = scene
            .primitives
            .iter()
            .position(|p| matches!(p, Primitive::NodeMarker { .. }))
            .unwrap();
        assert!(last_segment < first_marker);
    }

    proptest! {
        #[test]
        fn out_of_range_highlight_matches_no_highlight(
            values in proptest::collection::vec(-100.0f64..100.0, 0..20),
            offset in 0i64..50,
            negative in any::<bool>(),
        ) {
            let elements = numbers(&values);
            let index = if negative { -1 - offset } else { values.len() as i64 + offset };

            let mut sink = RecordingSink::new();
            let mut kit = Toolkit::new(&mut sink, Theme::classic());
            kit.draw_array(&elements, Some(index), "a").unwrap();
            kit.draw_array(&elements, None, "a").unwrap();
            kit.draw_search(&elements, Some(index), "s").unwrap();
            kit.draw_search(&elements, None, "s").unwrap();

            prop_assert_eq!(sink.scenes[0].bar_colors(), sink.scenes[1].bar_colors());
            prop_assert_eq!(sink.scenes[2].bar_colors(), sink.scenes[3].bar_colors());
            prop_assert!(sink.scenes[0].bar_colors().iter().all(|c| *c == "#4C78A8"));
        }
    }
}
