use crate::scene::{DiagramKind, FigureSize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub title_font_size: f32,
    pub text_color: String,
    pub axis_color: String,
    pub background: String,
    pub bar_color: String,
    pub accent_color: String,
    pub stack_color: String,
    pub queue_color: String,
    pub sort_color: String,
    pub node_fill: String,
    pub node_stroke: String,
    pub tree_edge_color: String,
    pub graph_edge_color: String,
    pub dpi: f32,
}

impl Theme {
    /// The only preset; colours follow the classic tableau palette.
    pub fn classic() -> Self {
        Self {
            font_family: "DejaVu Sans, Arial, sans-serif".to_string(),
            font_size: 12.0,
            title_font_size: 14.0,
            text_color: "#222222".to_string(),
            axis_color: "#333333".to_string(),
            background: "#FFFFFF".to_string(),
            bar_color: "#4C78A8".to_string(),
            accent_color: "#F58518".to_string(),
            stack_color: "#54A24B".to_string(),
            queue_color: "#E45756".to_string(),
            sort_color: "#72B7B2".to_string(),
            node_fill: "#f7f7f7".to_string(),
            node_stroke: "#333333".to_string(),
            tree_edge_color: "#333333".to_string(),
            graph_edge_color: "#999999".to_string(),
            dpi: 100.0,
        }
    }

    pub fn figure_size(&self, kind: DiagramKind) -> FigureSize {
        let (width, height) = match kind {
            DiagramKind::Array | DiagramKind::Stack | DiagramKind::Queue | DiagramKind::Search => {
                (6.0, 2.0)
            }
            DiagramKind::Sort => (6.0, 3.0),
            DiagramKind::Tree => (6.0, 4.0),
            DiagramKind::Graph => (4.0, 4.0),
        };
        FigureSize { width, height }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
