//! Documentation snippet self-test.
//!
//! Every markdown document may carry a visualization section whose first
//! fenced `python` block is an example using the toolkit. The harness pulls
//! those snippets out, runs each one headless in a fresh scope and reports
//! which ones fail.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::draw::Toolkit;
use crate::script::run_snippet;
use crate::sink::DisplaySink;
use crate::theme::Theme;

pub const VISUALIZATION_HEADING: &str = "## 🎨 Visualization (Optional)";
pub const DEFAULT_DIRS: [&str; 2] = ["04_DSA_Linear", "05_DSA_NonLinear"];

const RULE_WIDTH: usize = 60;

static SNIPPET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"{}[\s\S]*?```python\n([\s\S]*?)\n```",
        regex::escape(VISUALIZATION_HEADING)
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snippet<'a> {
    pub document: &'a Path,
    /// 1-based position within the document.
    pub index: usize,
    pub code: &'a str,
}

/// Lazily yields the snippets of one document, in order. Calling it again
/// restarts from the top.
pub fn extract_snippets<'a>(
    document: &'a Path,
    text: &'a str,
) -> impl Iterator<Item = Snippet<'a>> + 'a {
    SNIPPET_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .enumerate()
        .map(move |(i, code)| Snippet {
            document,
            index: i + 1,
            code: code.as_str(),
        })
}

pub fn document_dirs(root: &Path, dirs: &[String]) -> Vec<PathBuf> {
    if dirs.is_empty() {
        DEFAULT_DIRS.iter().map(|dir| root.join(dir)).collect()
    } else {
        dirs.iter().map(|dir| root.join(dir)).collect()
    }
}

/// The `*.md` files directly inside each directory, sorted per directory,
/// directories in the given order.
pub fn collect_documents(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir:? = dir; "Document directory not found, skipping");
            continue;
        }
        let mut found = Vec::new();
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_md = path.extension().and_then(|ext| ext.to_str()) == Some("md");
            if is_md && path.is_file() {
                found.push(path);
            }
        }
        found.sort();
        debug!(dir:? = dir, documents = found.len(); "Collected documents");
        documents.extend(found);
    }
    Ok(documents)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub document: PathBuf,
    pub index: usize,
    pub detail: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total: usize,
    pub failures: Vec<Failure>,
}

impl Report {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }

    pub fn write_summary<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out)?;
        writeln!(out, "Summary")?;
        writeln!(out, "  Total snippets: {}", self.total)?;
        writeln!(out, "  Failures: {}", self.failures.len())?;
        if !self.success() {
            writeln!(out)?;
            writeln!(out, "Failed snippets:")?;
            for failure in &self.failures {
                writeln!(
                    out,
                    "- {} (snippet {})",
                    failure.document.display(),
                    failure.index
                )?;
            }
        }
        Ok(())
    }
}

pub fn write_report_json(path: &Path, report: &Report) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
}

/// Runs snippets against one sink, configured headless for the whole run.
pub struct Harness<'s> {
    sink: &'s mut dyn DisplaySink,
    theme: Theme,
}

impl<'s> Harness<'s> {
    pub fn new(sink: &'s mut dyn DisplaySink, theme: Theme) -> Self {
        sink.configure(true);
        Self { sink, theme }
    }

    /// Runs one snippet in a fresh scope. Script errors and panics both
    /// become failures.
    pub fn execute(&mut self, snippet: &Snippet<'_>) -> Outcome {
        debug!(document:? = snippet.document, snippet = snippet.index; "Executing snippet");
        let mut toolkit = Toolkit::new(&mut *self.sink, self.theme.clone());
        let code = snippet.code;
        let result = panic::catch_unwind(AssertUnwindSafe(|| run_snippet(code, &mut toolkit)));
        match result {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(err)) => Outcome::Failed(err.diagnostic(code)),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Outcome::Failed(format!("panic: {message}\n"))
            }
        }
    }

    /// Extracts and runs every snippet of `text`, printing one line per
    /// snippet to `out`.
    pub fn run_document<W: Write>(
        &mut self,
        document: &Path,
        text: &str,
        report: &mut Report,
        out: &mut W,
    ) -> Result<()> {
        for snippet in extract_snippets(document, text) {
            report.total += 1;
            match self.execute(&snippet) {
                Outcome::Passed => {
                    writeln!(out, "OK:   {} (snippet {})", document.display(), snippet.index)?;
                }
                Outcome::Failed(detail) => {
                    writeln!(out, "FAIL: {} (snippet {})", document.display(), snippet.index)?;
                    if !detail.is_empty() {
                        writeln!(out, "{detail}")?;
                    }
                    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
                    report.failures.push(Failure {
                        document: document.to_path_buf(),
                        index: snippet.index,
                        detail,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn run<W: Write>(&mut self, documents: &[PathBuf], out: &mut W) -> Result<Report> {
        info!(documents = documents.len(); "Checking documentation snippets");
        let mut report = Report::default();
        for document in documents {
            let text = std::fs::read_to_string(document)
                .with_context(|| format!("reading {}", document.display()))?;
            self.run_document(document, &text, &mut report, out)?;
        }
        report.write_summary(out)?;
        info!(total = report.total, failures = report.failures.len(); "Check finished");
        Ok(report)
    }
}
