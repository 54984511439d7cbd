//! Criterion benchmarks for the timing sampler.
//!
//! The sampler sits on the hot path of every scheduled action, so the
//! rejection loop must stay cheap.  These benches pin down the cost of a
//! draw across the range shapes the scheduler actually uses.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use autotap_core::NormalSampler;

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler");

    group.bench_function("wide_delay_range", |b| {
        let mut sampler = NormalSampler::seeded(42);
        b.iter(|| black_box(sampler.sample(black_box(200), black_box(5_000))));
    });

    group.bench_function("narrow_delay_range", |b| {
        let mut sampler = NormalSampler::seeded(42);
        b.iter(|| black_box(sampler.sample(black_box(490), black_box(510))));
    });

    group.bench_function("coordinate_range", |b| {
        let mut sampler = NormalSampler::seeded(42);
        b.iter(|| black_box(sampler.sample_coord(black_box(0), black_box(1080))));
    });

    group.bench_function("degenerate_range", |b| {
        let mut sampler = NormalSampler::seeded(42);
        b.iter(|| black_box(sampler.sample(black_box(500), black_box(500))));
    });

    group.finish();
}

criterion_group!(benches, bench_sample);
criterion_main!(benches);
