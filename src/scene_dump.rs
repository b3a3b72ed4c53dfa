use crate::scene::{DiagramKind, Frame, Primitive, Scene};
use crate::theme::Theme;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct SceneDump {
    pub source: String,
    pub scenes: Vec<SceneEntry>,
}

#[derive(Debug, Serialize)]
pub struct SceneEntry {
    pub index: usize,
    pub kind: DiagramKind,
    pub title: String,
    pub width_px: f32,
    pub height_px: f32,
    pub frame: Frame,
    pub bars: usize,
    pub labels: usize,
    pub segments: usize,
    pub markers: usize,
    pub primitives: Vec<Primitive>,
}

impl SceneDump {
    pub fn from_scenes(source: &str, scenes: &[Scene], theme: &Theme) -> Self {
        let scenes = scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let count = |pred: fn(&Primitive) -> bool| {
                    scene.primitives.iter().filter(|p| pred(p)).count()
                };
                SceneEntry {
                    index,
                    kind: scene.kind,
                    title: scene.title.clone(),
                    width_px: scene.size.width * theme.dpi,
                    height_px: scene.size.height * theme.dpi,
                    frame: scene.frame.clone(),
                    bars: count(|p| matches!(p, Primitive::Bar { .. })),
                    labels: count(|p| matches!(p, Primitive::Label { .. })),
                    segments: count(|p| matches!(p, Primitive::Segment { .. })),
                    markers: count(|p| matches!(p, Primitive::NodeMarker { .. })),
                    primitives: scene.primitives.clone(),
                }
            })
            .collect();
        SceneDump {
            source: source.to_string(),
            scenes,
        }
    }
}

pub fn write_scene_dump(
    path: &Path,
    source: &str,
    scenes: &[Scene],
    theme: &Theme,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = SceneDump::from_scenes(source, scenes, theme);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::Toolkit;
    use crate::ir::Element;
    use crate::sink::RecordingSink;

    #[test]
    fn dump_counts_primitives() {
        let mut sink = RecordingSink::new();
        let values: Vec<Element> = [3i64, 1, 2].into_iter().map(Element::from).collect();
        Toolkit::new(&mut sink, Theme::classic())
            .draw_stack(&values, "Stack")
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenes.json");
        write_scene_dump(&path, "stack.py", &sink.scenes, &Theme::classic()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["source"], "stack.py");
        let entry = &json["scenes"][0];
        assert_eq!(entry["kind"], "stack");
        assert_eq!(entry["bars"], 3);
        assert_eq!(entry["labels"], 3);
        assert_eq!(entry["width_px"], 600.0);
    }
}
