//! Static data-structure diagrams (arrays, stacks, queues, sort and search
//! snapshots, binary trees, graphs) and a self-test harness for the
//! visualization snippets embedded in markdown documentation.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod draw;
pub mod harness;
pub mod ir;
pub mod layout;
pub mod render;
pub mod scene;
pub mod scene_dump;
pub mod script;
pub mod sink;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, OutputFormat};
pub use draw::{DrawError, Toolkit};
pub use harness::{Harness, Report, extract_snippets};
pub use ir::{Adjacency, Element, NodeId, TreeNode};
pub use scene::{DiagramKind, Primitive, Scene};
pub use sink::{DisplaySink, RecordingSink, Surface, SvgSink};
pub use theme::Theme;
