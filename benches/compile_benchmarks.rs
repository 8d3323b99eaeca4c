//! Performance benchmarks for Skein code generation.
//!
//! - Straight-line scripts of growing length
//! - Nested blocks with non-local returns
//! - Cascades and keyword sends at the arity limit

use bumpalo::Bump;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use skein::ast::{Script, Statement};
use skein::{AstBuilder, Compiler, CompilerConfig, SourceUnit};
use std::hint::black_box;

/// `| t | t := a foo: i bar: 2. t printNl` repeated `count` times.
fn straight_line<'ast>(b: &AstBuilder<'ast>, count: usize) -> Script<'ast> {
    let mut statements: Vec<Statement<'ast>> = Vec::with_capacity(count * 2);
    for index in 0..count {
        let line = index as u32 + 1;
        let send = b.at(line).keyword(
            b.reference("a"),
            &[("foo:", b.number(&index.to_string())), ("bar:", b.number("2"))],
        );
        statements.push(b.stmt(b.assign("t", send)));
        statements.push(b.stmt(b.unary(b.reference("t"), "printNl")));
    }
    b.script(&["t"], &statements)
}

/// `x ifTrue: [y ifTrue: [... ^depth]]` nested `depth` levels.
fn nested_blocks<'ast>(b: &AstBuilder<'ast>, depth: usize) -> Script<'ast> {
    let mut body = b.answer(b.number(&depth.to_string()));
    for level in 0..depth {
        let block = b.block(&[], &[], &[body]);
        body = b.stmt(b.keyword(b.reference(&format!("flag{level}")), &[("ifTrue:", block)]));
    }
    b.script(&[], &[body])
}

fn cascades<'ast>(b: &AstBuilder<'ast>, count: usize) -> Script<'ast> {
    let parts = [
        ("at:", b.number("1")),
        ("put:", b.number("2")),
        ("with:", b.number("3")),
        ("with:", b.number("4")),
        ("with:", b.number("5")),
    ];
    let messages: Vec<_> = (0..count)
        .map(|index| {
            if index % 2 == 0 {
                b.keyword_message(&parts)
            } else {
                b.unary_message("yourself")
            }
        })
        .collect();
    b.script(&[], &[b.stmt(b.cascade(b.reference("Transcript"), &messages))])
}

fn straight_line_benchmarks(c: &mut Criterion) {
    let _ = env_logger::builder().is_test(true).try_init();
    let compiler = Compiler::new(CompilerConfig::default());
    let unit = SourceUnit::new("st.bench", "Straight");
    let mut group = c.benchmark_group("compile/straight_line");

    for count in [10, 100, 1000] {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = straight_line(&b, count);
        group.throughput(Throughput::Elements(count as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), &script, |bench, script| {
            bench.iter(|| {
                let compiled = compiler.compile(black_box(script), &unit).unwrap();
                black_box(compiled.primary.bytes.len())
            });
        });
    }
    group.finish();
}

fn block_benchmarks(c: &mut Criterion) {
    let compiler = Compiler::new(CompilerConfig::default());
    let unit = SourceUnit::new("st.bench", "Nested");
    let mut group = c.benchmark_group("compile/nested_blocks");

    for depth in [1, 8, 32] {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = nested_blocks(&b, depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &script, |bench, script| {
            bench.iter(|| {
                let compiled = compiler.compile(black_box(script), &unit).unwrap();
                black_box(compiled.markers.len())
            });
        });
    }
    group.finish();
}

fn cascade_benchmarks(c: &mut Criterion) {
    let compiler = Compiler::new(CompilerConfig::default());
    let unit = SourceUnit::new("st.bench", "Cascade");
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = cascades(&b, 200);

    c.bench_function("compile/cascade_200", |bench| {
        bench.iter(|| {
            let compiled = compiler.compile(black_box(&script), &unit).unwrap();
            black_box(compiled.primary.bytes.len())
        });
    });
}

criterion_group!(benches, straight_line_benchmarks, block_benchmarks, cascade_benchmarks);
criterion_main!(benches);
