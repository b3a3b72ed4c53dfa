//! Display sinks: where finished scenes go.
//!
//! A draw call borrows the sink through a [`Surface`], which acquires a
//! presentation surface on creation and releases it when dropped, whether
//! the draw call returns normally, bails out with `?`, or unwinds.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use log::{debug, trace, warn};

use crate::config::OutputFormat;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::scene::{Primitive, Scene};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

pub trait DisplaySink {
    /// Called once per process before anything is drawn.
    fn configure(&mut self, headless: bool);

    fn acquire(&mut self, title: &str) -> Result<SurfaceId>;

    fn present(&mut self, id: SurfaceId, scene: &Scene) -> Result<()>;

    fn release(&mut self, id: SurfaceId) -> Result<()>;
}

/// A scene under construction, bound to one acquired surface.
pub struct Surface<'a> {
    sink: &'a mut dyn DisplaySink,
    id: SurfaceId,
    scene: Scene,
}

impl<'a> Surface<'a> {
    pub fn acquire(sink: &'a mut dyn DisplaySink, scene: Scene) -> Result<Self> {
        let id = sink.acquire(&scene.title)?;
        debug!(surface = id.0, title:% = scene.title; "Surface acquired");
        Ok(Self { sink, id, scene })
    }

    pub fn push(&mut self, primitive: Primitive) {
        trace!(surface = self.id.0, primitive:? = primitive; "Primitive");
        self.scene.primitives.push(primitive);
    }

    /// Hands the scene to the sink; the surface is released afterwards.
    pub fn present(self) -> Result<()> {
        self.sink.present(self.id, &self.scene)
    }
}

impl Drop for Surface<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.sink.release(self.id) {
            warn!(surface = self.id.0, error:% = err; "Failed to release surface");
        }
    }
}

/// Renders each presented scene to SVG (or PNG).
///
/// Headless: the rendered output is discarded unless an output directory is
/// set. Otherwise it goes to the output directory, or stdout without one.
pub struct SvgSink {
    theme: Theme,
    headless: bool,
    output_dir: Option<PathBuf>,
    format: OutputFormat,
    next_id: u64,
    open: BTreeSet<SurfaceId>,
    presented: usize,
    last_svg: Option<String>,
    recorded: Option<Vec<Scene>>,
}

impl SvgSink {
    pub fn new(theme: Theme, output_dir: Option<PathBuf>, format: OutputFormat) -> Self {
        Self {
            theme,
            headless: false,
            output_dir,
            format,
            next_id: 0,
            open: BTreeSet::new(),
            presented: 0,
            last_svg: None,
            recorded: None,
        }
    }

    /// Also keep a copy of every presented scene, see [`SvgSink::take_scenes`].
    pub fn recording(mut self) -> Self {
        self.recorded = Some(Vec::new());
        self
    }

    pub fn take_scenes(&mut self) -> Vec<Scene> {
        self.recorded.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn open_surfaces(&self) -> usize {
        self.open.len()
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn last_svg(&self) -> Option<&str> {
        self.last_svg.as_deref()
    }

    fn output_path(&self, dir: &std::path::Path, title: &str) -> PathBuf {
        let ext = match self.format {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        };
        dir.join(format!("{:03}-{}.{}", self.presented, slugify(title), ext))
    }
}

impl DisplaySink for SvgSink {
    fn configure(&mut self, headless: bool) {
        debug!(headless = headless; "Configuring SVG sink");
        self.headless = headless;
    }

    fn acquire(&mut self, _title: &str) -> Result<SurfaceId> {
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.open.insert(id);
        Ok(id)
    }

    fn present(&mut self, id: SurfaceId, scene: &Scene) -> Result<()> {
        if !self.open.contains(&id) {
            return Err(anyhow!("surface {} is not open", id.0));
        }
        let svg = render_svg(scene, &self.theme);
        match (&self.output_dir, self.headless) {
            (Some(dir), _) => {
                std::fs::create_dir_all(dir)?;
                let path = self.output_path(dir, &scene.title);
                match self.format {
                    OutputFormat::Svg => write_output_svg(&svg, Some(&path))?,
                    OutputFormat::Png => write_output_png(&svg, &path, &self.theme)?,
                }
                debug!(path:? = path; "Surface written");
            }
            (None, true) => {
                trace!(surface = id.0; "Headless presentation discarded");
            }
            (None, false) => match self.format {
                OutputFormat::Svg => write_output_svg(&svg, None)?,
                OutputFormat::Png => {
                    return Err(anyhow!("PNG output requires an output directory"));
                }
            },
        }
        self.presented += 1;
        self.last_svg = Some(svg);
        if let Some(recorded) = &mut self.recorded {
            recorded.push(scene.clone());
        }
        Ok(())
    }

    fn release(&mut self, id: SurfaceId) -> Result<()> {
        if self.open.remove(&id) {
            Ok(())
        } else {
            Err(anyhow!("surface {} released twice", id.0))
        }
    }
}

/// Keeps every presented scene in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub headless: Option<bool>,
    pub scenes: Vec<Scene>,
    pub acquired: usize,
    pub released: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_surfaces(&self) -> usize {
        self.acquired - self.released
    }

    pub fn last(&self) -> Option<&Scene> {
        self.scenes.last()
    }
}

impl DisplaySink for RecordingSink {
    fn configure(&mut self, headless: bool) {
        self.headless = Some(headless);
    }

    fn acquire(&mut self, _title: &str) -> Result<SurfaceId> {
        self.acquired += 1;
        Ok(SurfaceId(self.acquired as u64))
    }

    fn present(&mut self, _id: SurfaceId, scene: &Scene) -> Result<()> {
        self.scenes.push(scene.clone());
        Ok(())
    }

    fn release(&mut self, _id: SurfaceId) -> Result<()> {
        self.released += 1;
        Ok(())
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "figure".to_string()
    } else {
        slug.to_string()
    }
}
