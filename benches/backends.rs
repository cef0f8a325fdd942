//! Built-in back-end benchmarks
//!
//! Measures the direct NDFT reference and the no-op back-end on small spiral
//! trajectories, for single-coil and sense-mode multi-coil data.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nufft_bench::trajectory::generate;
use nufft_bench::{
    Antenna, ComplexTensor, NdftFactory, NoopFactory, OperatorFactory, OperatorParams, SmapsCache,
    TrajectorySpec, get_smaps,
};

fn spiral(size: usize) -> (nufft_bench::Trajectory, nufft_bench::TrajectoryParams) {
    let spec = TrajectorySpec {
        shots: 8,
        samples_per_shot: 64,
        img_size: vec![size, size],
        ..TrajectorySpec::default()
    };
    match generate("spiral", &spec) {
        Ok(t) => t,
        Err(e) => panic!("spiral trajectory: {e}"),
    }
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");
    group.sample_size(10);

    for size in [16, 32] {
        let (traj, params) = spiral(size);
        let shape = params.img_size;
        let image = ComplexTensor::<f32>::rand(shape.dims());
        let single = OperatorParams::<f32>::new(1);

        let factories: [(&str, &dyn OperatorFactory<f32>); 2] =
            [("noop", &NoopFactory), ("ndft", &NdftFactory)];
        for (name, factory) in factories {
            let Ok(op) = factory.create(&traj, &shape, &single) else {
                continue;
            };
            group.bench_with_input(BenchmarkId::new(name, size), &image, |b, x| {
                b.iter(|| op.op(black_box(x)))
            });
        }
    }
    group.finish();
}

fn bench_sense_grad(c: &mut Criterion) {
    let mut group = c.benchmark_group("ndft_sense_grad");
    group.sample_size(10);

    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let cache = SmapsCache::new(dir.path());

    for n_coils in [2, 4] {
        let (traj, params) = spiral(16);
        let shape = params.img_size;
        let Ok(maps) = get_smaps::<f32>(&shape, n_coils, Antenna::Birdcage, &cache) else {
            continue;
        };
        let mut op_params = OperatorParams::<f32>::new(n_coils);
        op_params.smaps = Some(Arc::new(maps));
        let Ok(op) = NdftFactory.create(&traj, &shape, &op_params) else {
            continue;
        };
        let image = ComplexTensor::<f32>::rand(shape.dims());
        let kspace = ComplexTensor::<f32>::randn(&[n_coils, traj.n_samples()]);
        group.bench_function(BenchmarkId::from_parameter(n_coils), |b| {
            b.iter(|| op.data_consistency(black_box(&image), black_box(&kspace)))
        });
    }
    group.finish();
}

/// Little-endian bytes of interleaved `(re, im)` pairs
#[cfg(feature = "gpu")]
fn complex_bytes(t: &ComplexTensor<f32>) -> Vec<u8> {
    t.data()
        .iter()
        .flat_map(|c| c.re.to_le_bytes().into_iter().chain(c.im.to_le_bytes()))
        .collect()
}

/// K-space upload through pooled scratch buffers versus fresh allocations
#[cfg(feature = "gpu")]
fn bench_gpu_staging(c: &mut Criterion) {
    use nufft_bench::gpu::{get_gpu_context, release_memory_pools};

    let Some(ctx) = get_gpu_context() else {
        return;
    };
    let mut group = c.benchmark_group("gpu_kspace_upload");
    group.sample_size(10);

    for n_coils in [1, 8] {
        let kspace = ComplexTensor::<f32>::randn(&[n_coils, 64 * 1024]);
        let bytes = complex_bytes(&kspace);

        group.bench_function(BenchmarkId::new("pooled", n_coils), |b| {
            b.iter(|| {
                let buffer = ctx.scratch_buffer(bytes.len());
                ctx.queue().write_buffer(&buffer, 0, black_box(&bytes));
                ctx.queue().submit(std::iter::empty());
                ctx.recycle(buffer);
            })
        });
        release_memory_pools();

        group.bench_function(BenchmarkId::new("fresh", n_coils), |b| {
            b.iter(|| {
                let buffer = ctx.scratch_buffer(bytes.len());
                ctx.queue().write_buffer(&buffer, 0, black_box(&bytes));
                ctx.queue().submit(std::iter::empty());
                drop(buffer);
            })
        });
    }
    group.finish();
}

#[cfg(not(feature = "gpu"))]
fn bench_gpu_staging(_c: &mut Criterion) {}

criterion_group!(benches, bench_forward, bench_sense_grad, bench_gpu_staging);
criterion_main!(benches);
