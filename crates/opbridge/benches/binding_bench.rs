#[path = "../tests/support/mod.rs"]
mod support;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use opbridge::{BridgeRegistry, Visibility};
use support::VectorAdd;

fn benchmark_lookup(c: &mut Criterion) {
    let fixture = support::vector_ops();
    let registry = BridgeRegistry::default();
    let handle = registry
        .load(&fixture.path, Visibility::Local)
        .expect("fixture should load");

    c.bench_function("lookup_raw/vector_add", |b| {
        b.iter(|| black_box(registry.lookup_raw(handle, black_box("vector_add"))));
    });
}

fn benchmark_call_paths(c: &mut Criterion) {
    let fixture = support::vector_ops();
    let registry = BridgeRegistry::default();
    let handle = registry
        .load(&fixture.path, Visibility::Local)
        .expect("fixture should load");
    // SAFETY: signature matches the fixture.
    let add = unsafe { registry.lookup::<VectorAdd>(handle, "vector_add") }
        .expect("vector_add should resolve");
    let raw = add.call(|f| f).expect("handle is loaded");

    let sizes: [usize; 3] = [4, 256, 4096];
    let mut group = c.benchmark_group("vector_add");

    for size in sizes {
        let a = vec![1_i32; size];
        let b = vec![2_i32; size];
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("guarded_call", size), &size, |bench, &n| {
            let mut out = vec![0_i32; n];
            bench.iter(|| {
                add.call(|f| unsafe { f(a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), black_box(n)) })
                    .expect("handle is loaded");
                black_box(&out);
            });
        });

        // Baseline: the bare pointer, with the liveness check left out.
        group.bench_with_input(BenchmarkId::new("bare_pointer", size), &size, |bench, &n| {
            let mut out = vec![0_i32; n];
            bench.iter(|| {
                // SAFETY: the handle stays loaded for the whole benchmark.
                unsafe { raw(a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), black_box(n)) };
                black_box(&out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_lookup, benchmark_call_paths);
criterion_main!(benches);
