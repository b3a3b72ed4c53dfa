use std::fs;
use std::path::{Path, PathBuf};

use dsviz::harness::{Harness, collect_documents, document_dirs, write_report_json};
use dsviz::{DiagramKind, RecordingSink, Report, Theme};

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn check(root: &Path, sink: &mut RecordingSink) -> (Report, String) {
    let documents = collect_documents(&document_dirs(root, &[])).expect("discovery failed");
    let mut harness = Harness::new(sink, Theme::classic());
    let mut out = Vec::new();
    let report = harness.run(&documents, &mut out).expect("harness run failed");
    (report, String::from_utf8(out).expect("report is utf-8"))
}

fn write_doc(dir: &Path, name: &str, snippet: &str) {
    fs::create_dir_all(dir).unwrap();
    let text =
        format!("# {name}\n\n## 🎨 Visualization (Optional)\n\n```python\n{snippet}\n```\n");
    fs::write(dir.join(name), text).unwrap();
}

#[test]
fn documentation_fixtures_all_pass() {
    let mut sink = RecordingSink::new();
    let (report, printed) = check(&fixtures_root(), &mut sink);

    assert_eq!(report.total, 6, "{printed}");
    assert!(report.success(), "{printed}");
    assert_eq!(report.exit_code(), 0);
    assert!(printed.contains("\nSummary\n  Total snippets: 6\n  Failures: 0\n"));
    assert!(!printed.contains("Failed snippets:"));

    let kinds: Vec<DiagramKind> = sink.scenes.iter().map(|scene| scene.kind).collect();
    assert_eq!(
        kinds,
        [
            DiagramKind::Array,
            DiagramKind::Array,
            DiagramKind::Stack,
            DiagramKind::Queue,
            DiagramKind::Sort,
            DiagramKind::Sort,
            DiagramKind::Sort,
            DiagramKind::Search,
            DiagramKind::Tree,
            DiagramKind::Tree,
            DiagramKind::Graph,
        ]
    );
    let titles: Vec<&str> = sink.scenes[4..8].iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Bubble sort pass 1",
            "Bubble sort pass 2",
            "Bubble sort pass 3",
            "Found 5 at index 3",
        ]
    );
    assert_eq!(sink.scenes[4].bar_heights(), [1.0, 4.0, 2.0, 5.0, 8.0]);
    assert_eq!(sink.scenes[6].bar_heights(), [1.0, 2.0, 4.0, 5.0, 8.0]);
    let user_tree = &sink.scenes[9];
    assert_eq!(user_tree.markers().count(), 7);
    assert_eq!(user_tree.segments().count(), 6);
    assert_eq!(sink.headless, Some(true));
    assert_eq!(sink.open_surfaces(), 0);
}

#[test]
fn documents_are_visited_in_sorted_order() {
    let documents = collect_documents(&document_dirs(&fixtures_root(), &[])).unwrap();
    let names: Vec<String> = documents
        .iter()
        .map(|path| {
            let dir = path.parent().unwrap().file_name().unwrap().to_string_lossy();
            let file = path.file_name().unwrap().to_string_lossy();
            format!("{dir}/{file}")
        })
        .collect();
    assert_eq!(
        names,
        [
            "04_DSA_Linear/01_Arrays.md",
            "04_DSA_Linear/02_Stacks_Queues.md",
            "04_DSA_Linear/03_Searching_Sorting.md",
            "05_DSA_NonLinear/01_Trees.md",
            "05_DSA_NonLinear/02_Graphs.md",
            "05_DSA_NonLinear/03_Heaps.md",
        ]
    );
}

#[test]
fn one_failing_snippet_fails_the_run() {
    let root = tempfile::tempdir().unwrap();
    let linear = root.path().join("04_DSA_Linear");
    write_doc(
        &linear,
        "a_ok.md",
        "from dsviz import draw_array\ndraw_array([1, 2, 3])",
    );
    write_doc(
        &linear,
        "b_bad.md",
        "from dsviz import draw_array\nvalues = [3, 1]\ndraw_array(values, highlight=0)",
    );
    write_doc(
        &root.path().join("05_DSA_NonLinear"),
        "c_ok.md",
        "from dsviz import draw_graph\ndraw_graph({1: [2], 2: [1]})",
    );

    let mut sink = RecordingSink::new();
    let (report, printed) = check(root.path(), &mut sink);

    assert_eq!(report.total, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.exit_code(), 1);
    let failure = &report.failures[0];
    assert!(failure.document.ends_with("04_DSA_Linear/b_bad.md"));
    assert_eq!(failure.index, 1);
    assert!(failure.detail.contains("unexpected keyword argument 'highlight'"));
    assert!(failure.detail.contains("3 | draw_array(values, highlight=0)"));

    let bad = failure.document.display().to_string();
    assert!(printed.contains(&format!("FAIL: {bad} (snippet 1)\n")));
    assert!(printed.contains(&format!("\nFailed snippets:\n- {bad} (snippet 1)\n")));
    assert_eq!(printed.matches("OK:   ").count(), 2);
    assert_eq!(sink.scenes.len(), 2);
}

#[test]
fn empty_tree_counts_zero_snippets() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("04_DSA_Linear")).unwrap();
    fs::write(root.path().join("04_DSA_Linear").join("plain.md"), "# Nothing to run\n").unwrap();

    let mut sink = RecordingSink::new();
    let (report, printed) = check(root.path(), &mut sink);

    assert_eq!(report, Report::default());
    assert_eq!(printed, "\nSummary\n  Total snippets: 0\n  Failures: 0\n");
    assert_eq!(sink.headless, Some(true));
}

#[test]
fn report_json_lists_failures() {
    let root = tempfile::tempdir().unwrap();
    write_doc(
        &root.path().join("05_DSA_NonLinear"),
        "tree.md",
        "from dsviz import Node\nroot = Node(1)\nroot.left.left = Node(2)",
    );
    let mut sink = RecordingSink::new();
    let (report, _) = check(root.path(), &mut sink);
    assert_eq!(report.failures.len(), 1);

    let path = root.path().join("report.json");
    write_report_json(&path, &report).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["failures"][0]["index"], 1);
    assert!(
        json["failures"][0]["detail"]
            .as_str()
            .unwrap()
            .contains("snippet line 3")
    );
}
