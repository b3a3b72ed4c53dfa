use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dsviz::ir::{Adjacency, Element, NodeId, TreeNode};
use dsviz::layout::{TreeSpacing, layout_graph, layout_tree};
use dsviz::render::render_svg;
use dsviz::script::run_snippet;
use dsviz::sink::RecordingSink;
use dsviz::{Scene, Theme, Toolkit};
use std::hint::black_box;

fn complete_tree(depth: usize, next: &mut i64) -> Option<TreeNode> {
    if depth == 0 {
        return None;
    }
    let left = complete_tree(depth - 1, next);
    *next += 1;
    let value = *next;
    let right = complete_tree(depth - 1, next);
    Some(TreeNode::with_children(value, left, right))
}

fn dense_graph(nodes: usize, degree: usize) -> Adjacency {
    let mut adj = Adjacency::new();
    for i in 0..nodes {
        let neighbors = (1..=degree)
            .map(|step| NodeId::from(format!("N{}", (i + step) % nodes)))
            .collect();
        adj.insert(NodeId::from(format!("N{i}")), neighbors);
    }
    adj
}

fn bar_values(len: usize) -> Vec<Element> {
    (0..len)
        .map(|i| Element::Number(((i * 37) % 101) as f64))
        .collect()
}

fn sample_scenes(theme: &Theme) -> Vec<(&'static str, Scene)> {
    let mut sink = RecordingSink::new();
    {
        let mut kit = Toolkit::new(&mut sink, theme.clone());
        kit.draw_array(&bar_values(64), Some(10), "Array")
            .expect("draw failed");
        kit.draw_stack(&bar_values(16), "Stack").expect("draw failed");
        let root = complete_tree(6, &mut 0);
        kit.draw_tree(root.as_ref(), "Tree").expect("draw failed");
        kit.draw_graph(&dense_graph(24, 3), "Graph")
            .expect("draw failed");
    }
    ["array_64", "stack_16", "tree_depth_6", "graph_24"]
        .into_iter()
        .zip(sink.scenes)
        .collect()
}

fn bench_tree_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_tree");
    for depth in [4usize, 8, 12] {
        let root = complete_tree(depth, &mut 0);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &root, |b, root| {
            b.iter(|| {
                let layout = layout_tree(black_box(root.as_ref()), TreeSpacing::default());
                black_box(layout.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_graph_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_graph");
    for (nodes, degree) in [(16usize, 2usize), (64, 4), (256, 8)] {
        let adj = dense_graph(nodes, degree);
        let name = format!("{nodes}x{degree}");
        group.bench_with_input(BenchmarkId::from_parameter(name), &adj, |b, adj| {
            b.iter(|| {
                let layout = layout_graph(black_box(adj));
                black_box(layout.map(|l| l.edges.len()));
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let theme = Theme::classic();
    for (name, scene) in sample_scenes(&theme) {
        group.bench_with_input(BenchmarkId::from_parameter(name), &scene, |b, scene| {
            b.iter(|| {
                let svg = render_svg(black_box(scene), &theme);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let snippet = "from dsviz import Node, draw_tree, draw_sort\n\
                   root = Node(8, Node(3, Node(1), Node(6)), Node(10, None, Node(14)))\n\
                   draw_tree(root, 'BST')\n\
                   steps = [[5, 1, 4, 2], [1, 5, 4, 2], [1, 4, 5, 2], [1, 2, 4, 5]]\n\
                   for step in steps:\n    draw_sort(step)\n";
    let theme = Theme::classic();
    c.bench_function("snippet_end_to_end", |b| {
        b.iter(|| {
            let mut sink = RecordingSink::new();
            let mut kit = Toolkit::new(&mut sink, theme.clone());
            run_snippet(black_box(snippet), &mut kit).expect("snippet failed");
            drop(kit);
            let total: usize = sink
                .scenes
                .iter()
                .map(|scene| render_svg(scene, &theme).len())
                .sum();
            black_box(total);
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_tree_layout, bench_graph_layout, bench_render, bench_end_to_end
);
criterion_main!(benches);
