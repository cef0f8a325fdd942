//! Birdcage sensitivity map benchmarks
//!
//! - Direct simulation across 2D and 3D volume sizes and coil counts
//! - Cache hits, i.e. decoding a previously simulated set from disk

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nufft_bench::smaps::{DEFAULT_RING_RADIUS, simulate};
use nufft_bench::{Antenna, SmapsCache, VolumeShape, get_smaps};

// ===== SIMULATION =====

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("birdcage_simulate");
    group.sample_size(10);

    // (n_coils, volume)
    let scenarios: [(usize, &[usize]); 4] = [
        (8, &[128, 128]),
        (32, &[256, 256]),
        (4, &[32, 64, 64]),
        (12, &[64, 64, 64]),
    ];
    for (n_coils, volume) in scenarios {
        let mut shape = vec![n_coils];
        shape.extend_from_slice(volume);
        let id = format!("{n_coils}x{volume:?}");
        group.bench_with_input(BenchmarkId::new("f32", &id), &shape, |b, s| {
            b.iter(|| simulate::<f32>(black_box(s), DEFAULT_RING_RADIUS, n_coils))
        });
    }
    group.finish();
}

// ===== CACHE =====

fn bench_cache_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("smaps_cache_hit");
    group.sample_size(10);

    let Ok(dir) = tempfile::tempdir() else {
        eprintln!("cannot create a scratch directory, skipping cache benchmarks");
        return;
    };
    let cache = SmapsCache::new(dir.path());

    for n_coils in [4, 12] {
        let Ok(shape) = VolumeShape::new(&[64, 64, 64]) else {
            continue;
        };
        // Warm the cache once outside the timed loop
        if get_smaps::<f32>(&shape, n_coils, Antenna::Birdcage, &cache).is_err() {
            continue;
        }
        group.bench_with_input(BenchmarkId::new("64^3", n_coils), &n_coils, |b, &n| {
            b.iter(|| get_smaps::<f32>(black_box(&shape), n, Antenna::Birdcage, &cache))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simulate, bench_cache_hit);
criterion_main!(benches);
