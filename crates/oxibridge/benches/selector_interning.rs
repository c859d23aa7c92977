// Selector interning benchmarks
//
// This benchmark suite measures:
// - Registry hits for already interned names
// - Registry misses (first interning of a name)
// - Per-call-site cached lookups via `sel!`
// - Contention when several threads intern the same names

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxibridge::{Sel, sel};
use std::thread;

/// Repeatedly intern a name that is already registered
fn bench_registry_hit(c: &mut Criterion) {
    let _warm = Sel::register("initWithContentRect:styleMask:backing:defer:").unwrap();

    c.bench_function("selector_registry_hit", |b| {
        b.iter(|| {
            black_box(Sel::register(black_box("initWithContentRect:styleMask:backing:defer:")).unwrap())
        })
    });
}

/// Intern a fresh name every iteration
fn bench_registry_miss(c: &mut Criterion) {
    let mut counter = 0u64;
    c.bench_function("selector_registry_miss", |b| {
        b.iter(|| {
            counter = counter.wrapping_add(1);
            let name = format!("benchSelector{counter}:");
            black_box(Sel::register(&name).unwrap())
        })
    });
}

/// `sel!` after its first use is a single atomic load
fn bench_call_site_cache(c: &mut Criterion) {
    c.bench_function("selector_call_site_cached", |b| {
        b.iter(|| black_box(sel!(makeKeyAndOrderFront:)))
    });
}

/// Name lengths typical of AppKit selectors
fn bench_name_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_name_length");

    for name in [
        "run",
        "setTitle:",
        "activateIgnoringOtherApps:",
        "applicationShouldTerminateAfterLastWindowClosed:",
    ] {
        let _warm = Sel::register(name).unwrap();
        group.throughput(Throughput::Bytes(name.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name.len()), name, |b, name| {
            b.iter(|| black_box(Sel::register(name).unwrap()))
        });
    }

    group.finish();
}

/// Threads interning the same small set of names
fn bench_concurrent_interning(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_concurrent");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        thread::spawn(|| {
                            for i in 0..100 {
                                black_box(Sel::register(&format!("sharedSelector{i}")).unwrap());
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_registry_hit,
    bench_registry_miss,
    bench_call_site_cache,
    bench_name_length,
    bench_concurrent_interning,
);
criterion_main!(benches);
