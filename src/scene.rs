use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Bar {
        x: f64,
        height: f64,
        width: f64,
        color: String,
    },
    Label {
        x: f64,
        y: f64,
        text: String,
    },
    Segment {
        from: Point,
        to: Point,
        color: String,
    },
    NodeMarker {
        center: Point,
        label: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Array,
    Stack,
    Queue,
    Sort,
    Search,
    Tree,
    Graph,
}

/// Figure size in inches; the renderer converts with a fixed dpi.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FigureSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Visible x axis with one tick per index; `show_y` toggles the y axis.
    Axes { ticks: usize, show_y: bool },
    Hidden,
}

/// Everything one draw call hands to the display sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub kind: DiagramKind,
    pub title: String,
    pub size: FigureSize,
    pub frame: Frame,
    pub primitives: Vec<Primitive>,
}

impl Scene {
    pub fn new(kind: DiagramKind, title: &str, size: FigureSize, frame: Frame) -> Self {
        Self {
            kind,
            title: title.to_string(),
            size,
            frame,
            primitives: Vec::new(),
        }
    }

    pub fn bar_colors(&self) -> Vec<&str> {
        self.primitives
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::Bar { color, .. } => Some(color.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn bar_heights(&self) -> Vec<f64> {
        self.primitives
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::Bar { height, .. } => Some(*height),
                _ => None,
            })
            .collect()
    }

    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.primitives.iter().filter_map(|primitive| match primitive {
            Primitive::Segment { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
    }

    pub fn markers(&self) -> impl Iterator<Item = (Point, &str)> + '_ {
        self.primitives.iter().filter_map(|primitive| match primitive {
            Primitive::NodeMarker { center, label } => Some((*center, label.as_str())),
            _ => None,
        })
    }
}
