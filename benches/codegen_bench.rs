use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;
use usidc::*;

// Latency of each pipeline stage on the demo document and on generated
// documents with a growing number of kernels.

fn demo_source() -> String {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let path = manifest_dir
        .parent()
        .unwrap()
        .join("demos")
        .join("nbsum.usid.json");
    std::fs::read_to_string(path).expect("demo document must exist")
}

/// USID document with `n` edge kernels, each summing `in_field` over the
/// edge's vertices into its own output field.
fn generate_scaling_document(n_kernels: usize) -> String {
    let mut params = vec![
        r#"{"name": "in_field", "tag": "in_tag", "vtype": "FLOAT64", "dimensions": [{"kind": "Horizontal", "primary": "Vertex"}, {"kind": "Vertical"}]}"#.to_string(),
    ];
    let mut kernels = Vec::new();
    let mut calls = Vec::new();
    for k in 0..n_kernels {
        params.push(format!(
            r#"{{"name": "out_{k}", "tag": "out_{k}_tag", "vtype": "FLOAT64", "dimensions": [{{"kind": "Horizontal", "primary": "Edge"}}, {{"kind": "Vertical"}}]}}"#
        ));
        kernels.push(format!(
            r#"{{
  "name": "k{k}", "primary_location": "Edge",
  "primary_composite": {{"name": "e", "entries": [
    {{"kind": "SidCompositeEntry", "name": "out_{k}_tag", "ref": "out_{k}"}},
    {{"kind": "SidCompositeEntry", "name": "e2v_tag", "ref": "e2v"}}]}},
  "secondary_composites": [{{"name": "v", "entries": [{{"kind": "SidCompositeEntry", "name": "in_tag", "ref": "in_field"}}]}}],
  "body": [
    {{"kind": "VarDecl", "name": "acc", "vtype": "FLOAT64", "init": {{"kind": "Literal", "value": "ZERO", "vtype": "FLOAT64"}}}},
    {{"kind": "NeighborLoop", "primary_sid": "e", "secondary_sid": "v", "connectivity": "e2v", "primary": "p", "secondary": "n", "body": [
      {{"kind": "AssignStmt", "left": {{"kind": "VarAccess", "name": "acc"}},
        "right": {{"kind": "BinaryOp", "op": "+", "left": {{"kind": "VarAccess", "name": "acc"}}, "right": {{"kind": "FieldAccess", "name": "in_tag", "sid": "n"}}}}}}]}},
    {{"kind": "AssignStmt", "left": {{"kind": "FieldAccess", "name": "out_{k}_tag", "sid": "e"}}, "right": {{"kind": "VarAccess", "name": "acc"}}}}]
}}"#
        ));
        calls.push(format!(r#"{{"name": "k{k}"}}"#));
    }
    format!(
        r#"{{"name": "scaled",
 "connectivities": [{{"name": "e2v", "tag": "e2v_tag", "max_neighbors": 2, "has_skip_values": false}}],
 "parameters": [{}],
 "kernels": [{}],
 "ctrlflow_ast": [{}]}}"#,
        params.join(", "),
        kernels.join(", "),
        calls.join(", ")
    )
}

fn bench_full_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/full_compile_latency");
    let opts = codegen::CodegenOptions::default();
    let demo = demo_source();

    group.bench_function("nbsum", |b| {
        b.iter(|| {
            let compiled = pipeline::compile_usid(black_box(&demo), &opts, |_, _| {});
            black_box(compiled.expect("demo must compile"));
        });
    });

    group.finish();
}

fn bench_stage_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/stage_latency");
    let source = generate_scaling_document(16);
    let root = pipeline::load_usid(&source).expect("scaling document must load");
    let raw = codegen::generate_raw(&root, &backend::Backend::NAIVE).expect("must generate");

    group.bench_function("load", |b| {
        b.iter(|| black_box(pipeline::load_usid(black_box(&source))));
    });
    group.bench_function("validate", |b| {
        b.iter(|| black_box(root.validate()));
    });
    group.bench_function("generate", |b| {
        b.iter(|| black_box(codegen::generate_raw(&root, &backend::Backend::NAIVE)));
    });
    group.bench_function("format", |b| {
        let formatter = format::BuiltinFormatter::default();
        b.iter(|| black_box(format::SourceFormatter::format(&formatter, black_box(&raw))));
    });

    group.finish();
}

fn bench_kernel_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/kernel_scaling");

    for n in [1usize, 8, 64, 256] {
        let source = generate_scaling_document(n);
        let root = pipeline::load_usid(&source).expect("scaling document must load");
        group.bench_with_input(BenchmarkId::from_parameter(n), &root, |b, root| {
            b.iter(|| black_box(codegen::generate_raw(root, &backend::Backend::GPU)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_compile,
    bench_stage_latency,
    bench_kernel_scaling
);
criterion_main!(benches);
