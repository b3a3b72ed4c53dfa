use crate::ir::format_number;
use crate::scene::{Frame, Point, Primitive, Scene};
use crate::text_metrics::measure_text_width;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const MARGIN_LEFT: f64 = 48.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 36.0;
const MARGIN_BOTTOM: f64 = 28.0;
const MARKER_PADDING: f64 = 7.0;
const MIN_MARKER_RADIUS: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    /// Pads each axis by a fraction of its span (at least `min_pad`).
    fn padded(self, fraction: f64, min_pad: f64) -> Self {
        let pad_x = ((self.max_x - self.min_x) * fraction).max(min_pad);
        let pad_y = ((self.max_y - self.min_y) * fraction).max(min_pad);
        Self {
            min_x: self.min_x - pad_x,
            max_x: self.max_x + pad_x,
            min_y: self.min_y - pad_y,
            max_y: self.max_y + pad_y,
        }
    }
}

/// Maps data coordinates onto the plot area (y grows upwards in data space).
struct Viewport {
    bounds: Bounds,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let span_x = (self.bounds.max_x - self.bounds.min_x).max(f64::EPSILON);
        let span_y = (self.bounds.max_y - self.bounds.min_y).max(f64::EPSILON);
        let px = self.left + (x - self.bounds.min_x) / span_x * self.width;
        let py = self.top + (self.bounds.max_y - y) / span_y * self.height;
        (px, py)
    }

    fn map_point(&self, point: Point) -> (f64, f64) {
        self.map(point.x, point.y)
    }
}

pub fn render_svg(scene: &Scene, theme: &Theme) -> String {
    let width = (scene.size.width * theme.dpi) as f64;
    let height = (scene.size.height * theme.dpi) as f64;
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        width / 2.0,
        MARGIN_TOP * 0.6,
        theme.font_family,
        theme.title_font_size,
        theme.text_color,
        escape_xml(&scene.title)
    ));

    let (margin_left, margin_bottom) = match scene.frame {
        Frame::Axes { show_y: true, .. } => (MARGIN_LEFT, MARGIN_BOTTOM),
        Frame::Axes { show_y: false, .. } => (MARGIN_RIGHT, MARGIN_BOTTOM),
        Frame::Hidden => (MARGIN_RIGHT, MARGIN_RIGHT),
    };
    let viewport = Viewport {
        bounds: data_bounds(scene),
        left: margin_left,
        top: MARGIN_TOP,
        width: (width - margin_left - MARGIN_RIGHT).max(1.0),
        height: (height - MARGIN_TOP - margin_bottom).max(1.0),
    };

    if let Frame::Axes { ticks, show_y } = scene.frame {
        svg.push_str(&axes_svg(&viewport, ticks, show_y, theme));
    }

    for primitive in &scene.primitives {
        svg.push_str(&primitive_svg(primitive, &viewport, theme));
    }

    svg.push_str("</svg>");
    svg
}

fn data_bounds(scene: &Scene) -> Bounds {
    let mut bounds = Bounds::empty();
    for primitive in &scene.primitives {
        match primitive {
            Primitive::Bar {
                x, height, width, ..
            } => {
                bounds.include(x - width / 2.0, 0.0);
                bounds.include(x + width / 2.0, *height);
            }
            Primitive::Label { x, y, .. } => bounds.include(*x, *y),
            Primitive::Segment { from, to, .. } => {
                bounds.include(from.x, from.y);
                bounds.include(to.x, to.y);
            }
            Primitive::NodeMarker { center, .. } => bounds.include(center.x, center.y),
        }
    }
    if bounds.is_empty() {
        return Bounds {
            min_x: 0.0,
            max_x: 1.0,
            min_y: 0.0,
            max_y: 1.0,
        };
    }
    match scene.frame {
        // Bars sit on the axis; only the top and sides get headroom.
        Frame::Axes { .. } => Bounds {
            min_x: bounds.min_x - 0.1,
            max_x: bounds.max_x + 0.1,
            min_y: bounds.min_y,
            max_y: (bounds.max_y + (bounds.max_y - bounds.min_y) * 0.05).max(bounds.min_y + 1.0),
        },
        Frame::Hidden => bounds.padded(0.15, 0.5),
    }
}

fn axes_svg(viewport: &Viewport, ticks: usize, show_y: bool, theme: &Theme) -> String {
    let mut svg = String::new();
    let (x0, y_axis) = viewport.map(viewport.bounds.min_x, 0.0_f64.max(viewport.bounds.min_y));
    let (x1, _) = viewport.map(viewport.bounds.max_x, 0.0);
    svg.push_str(&format!(
        "<line x1=\"{x0:.2}\" y1=\"{y_axis:.2}\" x2=\"{x1:.2}\" y2=\"{y_axis:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
        theme.axis_color
    ));
    for tick in 0..ticks {
        let (tx, _) = viewport.map(tick as f64, 0.0);
        svg.push_str(&format!(
            "<line x1=\"{tx:.2}\" y1=\"{y_axis:.2}\" x2=\"{tx:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
            y_axis + 4.0,
            theme.axis_color
        ));
        svg.push_str(&format!(
            "<text x=\"{tx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{tick}</text>",
            y_axis + 4.0 + theme.font_size as f64,
            theme.font_family,
            theme.font_size,
            theme.text_color
        ));
    }
    if show_y {
        let (_, top) = viewport.map(0.0, viewport.bounds.max_y);
        let (_, bottom) = viewport.map(0.0, viewport.bounds.min_y);
        svg.push_str(&format!(
            "<line x1=\"{x0:.2}\" y1=\"{top:.2}\" x2=\"{x0:.2}\" y2=\"{bottom:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
            theme.axis_color
        ));
        for value in [viewport.bounds.min_y.max(0.0), viewport.bounds.max_y] {
            let (_, ty) = viewport.map(0.0, value);
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                x0 - 6.0,
                ty + theme.font_size as f64 / 3.0,
                theme.font_family,
                theme.font_size,
                theme.text_color,
                format_number((value * 10.0).round() / 10.0)
            ));
        }
    }
    svg
}

fn primitive_svg(primitive: &Primitive, viewport: &Viewport, theme: &Theme) -> String {
    match primitive {
        Primitive::Bar {
            x,
            height,
            width,
            color,
        } => {
            let (left, top) = viewport.map(x - width / 2.0, height.max(0.0));
            let (right, bottom) = viewport.map(x + width / 2.0, height.min(0.0));
            format!(
                "<rect x=\"{left:.2}\" y=\"{top:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{color}\"/>",
                (right - left).max(0.0),
                (bottom - top).max(0.0)
            )
        }
        Primitive::Label { x, y, text } => {
            let (px, py) = viewport.map(*x, *y);
            format!(
                "<text x=\"{px:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                py + theme.font_size as f64 / 3.0,
                theme.font_family,
                theme.font_size,
                theme.text_color,
                escape_xml(text)
            )
        }
        Primitive::Segment { from, to, color } => {
            let (x1, y1) = viewport.map_point(*from);
            let (x2, y2) = viewport.map_point(*to);
            format!(
                "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" stroke=\"{color}\" stroke-width=\"1.4\"/>"
            )
        }
        Primitive::NodeMarker { center, label } => {
            let (cx, cy) = viewport.map_point(*center);
            let radius = marker_radius(label, theme);
            format!(
                "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{radius:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/><text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                theme.node_fill,
                theme.node_stroke,
                cy + theme.font_size as f64 / 3.0,
                theme.font_family,
                theme.font_size,
                theme.text_color,
                escape_xml(label)
            )
        }
    }
}

/// Circle radius that encloses the label.
pub fn marker_radius(label: &str, theme: &Theme) -> f64 {
    let text_width = measure_text_width(label, theme.font_size, &theme.font_family) as f64;
    (text_width / 2.0 + MARKER_PADDING).max(MIN_MARKER_RADIUS)
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            println!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().to_string())
        .unwrap_or_else(|| "sans-serif".to_string());

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _theme: &Theme) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DiagramKind, FigureSize};

    fn bar_scene() -> Scene {
        let mut scene = Scene::new(
            DiagramKind::Array,
            "Bars <&>",
            FigureSize {
                width: 6.0,
                height: 2.0,
            },
            Frame::Axes {
                ticks: 2,
                show_y: true,
            },
        );
        for (i, height) in [3.0, 5.0].into_iter().enumerate() {
            scene.primitives.push(Primitive::Bar {
                x: i as f64,
                height,
                width: 0.8,
                color: "#4C78A8".to_string(),
            });
        }
        scene
    }

    #[test]
    fn render_svg_basic() {
        let svg = render_svg(&bar_scene(), &Theme::classic());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"600\""));
        assert!(svg.contains("Bars &lt;&amp;&gt;"));
        assert_eq!(svg.matches("fill=\"#4C78A8\"").count(), 2);
    }

    #[test]
    fn taller_bar_is_taller_in_pixels() {
        let scene = bar_scene();
        let viewport = Viewport {
            bounds: data_bounds(&scene),
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let (_, top_small) = viewport.map(0.0, 3.0);
        let (_, top_large) = viewport.map(1.0, 5.0);
        let (_, base) = viewport.map(0.0, 0.0);
        assert!(top_large < top_small);
        assert!((base - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_scene_still_renders_title() {
        let scene = Scene::new(
            DiagramKind::Tree,
            "Empty",
            FigureSize {
                width: 6.0,
                height: 4.0,
            },
            Frame::Hidden,
        );
        let svg = render_svg(&scene, &Theme::classic());
        assert!(svg.contains(">Empty</text>"));
        assert!(!svg.contains("<circle"));
    }

    #[test]
    fn markers_are_circles_with_labels() {
        let mut scene = Scene::new(
            DiagramKind::Graph,
            "G",
            FigureSize {
                width: 4.0,
                height: 4.0,
            },
            Frame::Hidden,
        );
        scene.primitives.push(Primitive::NodeMarker {
            center: Point::new(1.0, 0.0),
            label: "A".to_string(),
        });
        let svg = render_svg(&scene, &Theme::classic());
        assert!(svg.contains("<circle"));
        assert!(svg.contains(">A</text>"));
    }
}
