//! Criterion benchmarks for event detection.
//!
//! A sealed raw file holds up to ~262k samples (5 MiB at 20 bytes each);
//! the processor must analyse one well inside the collector's rotation
//! period.
//!
//! Run with: cargo bench --bench detector

use accel_core::Sample;
use accel_processor::detector::{magnitudes, rolling_rms};
use accel_processor::{detect_events, DetectorConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// 1 kHz baseline at 1 g with a spike every 20 s.
fn synthetic(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let az = if i % 20_000 == 10_000 { 15.0 } else { 1.0 };
            Sample::new(1_770_778_000.0 + i as f64 * 0.001, 0.01, -0.02, az)
        })
        .collect()
}

fn detect_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_events");
    let config = DetectorConfig::default();

    for (name, n) in [("10k", 10_000), ("100k", 100_000), ("262k", 262_143)] {
        let samples = synthetic(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("detect", name), &samples, |b, samples| {
            b.iter(|| detect_events(black_box(samples), 1000.0, &config));
        });
    }

    group.finish();
}

fn rms_throughput(c: &mut Criterion) {
    let mags = magnitudes(&synthetic(262_143));
    c.bench_function("rolling_rms_262k", |b| {
        b.iter(|| rolling_rms(black_box(&mags), 2000));
    });
}

criterion_group!(benches, detect_throughput, rms_throughput);
criterion_main!(benches);
