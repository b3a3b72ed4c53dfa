use crate::config::{self, Config};
use crate::draw::Toolkit;
use crate::harness::{
    Harness, collect_documents, document_dirs, extract_snippets, write_report_json,
};
use crate::scene_dump::write_scene_dump;
use crate::script::run_snippet;
use crate::sink::{DisplaySink, SvgSink};
use crate::text_metrics;
use anyhow::{Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::info;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "dsviz",
    version,
    about = "Data-structure diagrams and documentation snippet checks"
)]
pub struct Args {
    /// Log level used when RUST_LOG is unset
    #[arg(long = "log-level", global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every visualization snippet in the documentation and report failures
    Check(CheckArgs),
    /// Execute a snippet file (or every snippet of a markdown file) and write the figures
    Render(RenderArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CheckArgs {
    /// Documentation root
    #[arg(long = "root", default_value = ".")]
    pub root: PathBuf,

    /// Document directories under the root (default: 04_DSA_Linear 05_DSA_NonLinear)
    pub dirs: Vec<String>,

    /// Also write the report as JSON
    #[arg(long = "json")]
    pub json: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    /// Input file (.py snippet or .md document) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output directory. Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Write every presented scene as JSON
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl From<OutputFormat> for config::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Svg => config::OutputFormat::Svg,
            OutputFormat::Png => config::OutputFormat::Png,
        }
    }
}

/// Runs the parsed command and returns the process exit code.
pub fn run(args: &Args) -> Result<i32> {
    let config = Config::from_env()?;
    text_metrics::init_cache_dir(&config.cache_dir);
    match &args.command {
        Command::Check(check_args) => check(check_args, &config),
        Command::Render(render_args) => render(render_args, config),
    }
}

fn check(args: &CheckArgs, config: &Config) -> Result<i32> {
    let dirs = document_dirs(&args.root, &args.dirs);
    let documents = collect_documents(&dirs)?;
    let mut sink = SvgSink::new(
        config.theme.clone(),
        config.output_dir.clone(),
        config.format,
    );
    let mut harness = Harness::new(&mut sink, config.theme.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = harness.run(&documents, &mut out)?;
    if let Some(path) = &args.json {
        write_report_json(path, &report)?;
    }
    Ok(report.exit_code())
}

fn render(args: &RenderArgs, mut config: Config) -> Result<i32> {
    if let Some(dir) = &args.output {
        config.output_dir = Some(dir.clone());
    }
    if let Some(format) = args.output_format {
        config.format = format.into();
    }

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let source = args
        .input
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    let snippets: Vec<&str> = if is_markdown {
        extract_snippets(Path::new(&source), &input)
            .map(|snippet| snippet.code)
            .collect()
    } else {
        vec![input.as_str()]
    };
    if snippets.is_empty() {
        return Err(anyhow!("No visualization snippets found in input"));
    }

    let mut sink = SvgSink::new(
        config.theme.clone(),
        config.output_dir.clone(),
        config.format,
    )
    .recording();
    sink.configure(config.headless);
    {
        let mut toolkit = Toolkit::new(&mut sink, config.theme.clone());
        for (idx, code) in snippets.iter().enumerate() {
            run_snippet(code, &mut toolkit).map_err(|err| {
                anyhow!("snippet {} failed\n{}", idx + 1, err.diagnostic(code))
            })?;
        }
    }
    info!(snippets = snippets.len(), presented = sink.presented(); "Render finished");

    if let Some(path) = &args.dump {
        write_scene_dump(path, &source, &sink.take_scenes(), &config.theme)?;
    }
    Ok(0)
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_with_dirs_and_json() {
        let args = Args::try_parse_from([
            "dsviz", "check", "--root", "docs", "04_DSA_Linear", "--json", "r.json",
        ])
        .unwrap();
        let Command::Check(check) = args.command else {
            panic!("expected check");
        };
        assert_eq!(check.root, PathBuf::from("docs"));
        assert_eq!(check.dirs, ["04_DSA_Linear"]);
        assert_eq!(check.json, Some(PathBuf::from("r.json")));
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn parses_render_flags() {
        let args = Args::try_parse_from([
            "dsviz", "--log-level", "debug", "render", "-i", "stack.py", "-o", "out", "-e", "png",
        ])
        .unwrap();
        let Command::Render(render) = args.command else {
            panic!("expected render");
        };
        assert_eq!(render.input, Some(PathBuf::from("stack.py")));
        assert!(matches!(render.output_format, Some(OutputFormat::Png)));
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn markdown_input_is_detected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("queue.md");
        std::fs::write(&md, "# Queue\n").unwrap();
        let (content, is_md) = read_input(Some(&md)).unwrap();
        assert!(is_md);
        assert_eq!(content, "# Queue\n");

        let py = dir.path().join("queue.py");
        std::fs::write(&py, "pass\n").unwrap();
        assert!(!read_input(Some(&py)).unwrap().1);
    }

    #[test]
    fn render_writes_figures_and_dump() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tree.md");
        std::fs::write(
            &input,
            "## 🎨 Visualization (Optional)\n```python\n\
             from dsviz import Node, draw_tree\n\
             draw_tree(Node(1, Node(2), Node(3)), 'Small tree')\n\
             ```\n",
        )
        .unwrap();
        let out = dir.path().join("figures");
        let dump = dir.path().join("scenes.json");
        let args = RenderArgs {
            input: Some(input),
            output: Some(out.clone()),
            output_format: Some(OutputFormat::Svg),
            dump: Some(dump.clone()),
        };
        let code = render(&args, Config::default()).unwrap();
        assert_eq!(code, 0);
        assert!(out.join("000-small-tree.svg").exists());
        let json = std::fs::read_to_string(dump).unwrap();
        assert!(json.contains("\"title\": \"Small tree\""));
    }

    #[test]
    fn render_reports_failing_snippet() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.py");
        std::fs::write(&input, "import numpy\n").unwrap();
        let args = RenderArgs {
            input: Some(input),
            output: Some(dir.path().to_path_buf()),
            output_format: None,
            dump: None,
        };
        let err = render(&args, Config::default()).unwrap_err();
        assert!(err.to_string().contains("no module named 'numpy'"));
    }
}
