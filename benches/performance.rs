//! Performance benchmarks for Beacon.
//!
//! Run with: cargo bench
//!
//! Target performance:
//! - Registry search: < 1ms for a few hundred commands
//! - Hotkey parsing: negligible

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use beacon::commands::{Command, CommandRegistry, RenderResult};
use beacon::extensions::ExtensionInfo;
use beacon::KeyCombo;

/// Registry with `count` commands spread over ten extensions, every tenth
/// with a preview.
fn populated_registry(count: usize) -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    for i in 0..count {
        let owner = Rc::new(ExtensionInfo::builtin(&format!("ext{}", i % 10), "Bench"));
        let mut command = Command::view(
            owner,
            &format!("command{}", i),
            &format!("Command {} - Test Entry for Benchmarking", i),
        );
        if i % 10 == 0 {
            command = command.with_preview(Rc::new(|query: &str| {
                Ok(query
                    .parse::<i64>()
                    .ok()
                    .map(|n| RenderResult::text((n * 2).to_string())))
            }));
        }
        // Ids are unique by construction
        let _ = registry.register(command);
    }

    registry
}

/// Benchmark substring search over the registry.
fn bench_search(c: &mut Criterion) {
    let registry = populated_registry(200);
    let queries = ["", "command", "command 50", "bench", "zzz"];

    let mut group = c.benchmark_group("registry_search");

    for query in queries {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, query| {
            b.iter(|| black_box(registry.search(black_box(query)).len()))
        });
    }

    group.finish();
}

/// Benchmark fuzzy-ranked search.
fn bench_fuzzy_search(c: &mut Criterion) {
    let registry = populated_registry(200);
    let queries = ["cmd", "test entry", "c50"];

    let mut group = c.benchmark_group("fuzzy_search");

    for query in queries {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, query| {
            b.iter(|| black_box(registry.fuzzy_search(black_box(query)).len()))
        });
    }

    group.finish();
}

/// Benchmark preview fan-out across every preview-capable command.
fn bench_preview(c: &mut Criterion) {
    let registry = populated_registry(200);

    c.bench_function("registry_preview", |b| {
        b.iter(|| black_box(registry.preview(black_box("21")).len()))
    });
}

/// Benchmark hotkey string normalization.
fn bench_key_combo(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_combo");

    let combos = [
        ("simple", "Alt+Space"),
        ("aliases", "cmd+opt+shift+k"),
        ("function", "Ctrl+F12"),
    ];

    for (name, combo) in combos {
        group.bench_with_input(BenchmarkId::from_parameter(name), &combo, |b, combo| {
            b.iter(|| black_box(KeyCombo::parse(black_box(combo))))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_search,
    bench_fuzzy_search,
    bench_preview,
    bench_key_combo,
);

criterion_main!(benches);
