//! Performance benchmarks for Butterworth filters and bucket scanning
//!
//! Run with: cargo bench -p denoise-dsp --bench filter_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use denoise_dsp::{butterworth, BucketScanner, Filter, PassType};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// One second of uniform noise at 48 kHz
fn generate_noise(len: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn bench_butterworth_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("butterworth");
    let input = generate_noise(48_000);
    group.throughput(Throughput::Elements(input.len() as u64));

    for order in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("low-pass", order), &input, |b, input| {
            let mut filter = butterworth::create(4500.0 / 48000.0, order, PassType::LowPass)
                .expect("valid filter");
            b.iter(|| {
                filter.reset();
                let mut acc = 0.0;
                for &x in input {
                    acc += filter.filter(black_box(x));
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

fn bench_bucket_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_scanner");
    let input = generate_noise(48_000);
    group.throughput(Throughput::Elements(input.len() as u64));

    for window in [1200usize, 14_400] {
        group.bench_with_input(BenchmarkId::new("window", window), &input, |b, input| {
            let mut scanner = BucketScanner::new(window).expect("valid bucket");
            b.iter(|| {
                scanner.reset();
                for &x in input {
                    black_box(scanner.add_sample(x).expect("in range"));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_butterworth_orders, bench_bucket_scanner);
criterion_main!(benches);
