//! Sweep the built-in back-ends over two procedural trajectories and a few
//! coil counts, then print the per-coil summary of the result files.
//!
//! ```bash
//! RUST_LOG=nufft_bench=debug cargo run --release --example synthetic_benchmark -- out/
//! ```

use nufft_bench::logging::init_tracing;
use nufft_bench::results::read_dir_records;
use nufft_bench::{
    BackendConfig, BackendRegistry, BenchmarkRunner, RunConfig, Sweep, TrajectorySpec, load_data,
    summarize,
};

fn main() -> nufft_bench::Result<()> {
    init_tracing();

    let output_dir = std::env::args()
        .nth(1)
        .map_or_else(|| std::env::temp_dir().join("nufft-bench"), Into::into);

    let mut base = RunConfig::default();
    base.trajectory.spec = TrajectorySpec {
        shots: 16,
        samples_per_shot: 128,
        img_size: vec![32, 32],
        ..TrajectorySpec::default()
    };
    base.max_time = 0.5;
    base.output_dir = output_dir.clone();

    let sweep = Sweep {
        base,
        backends: vec![BackendConfig::named("noop"), BackendConfig::named("ndft")],
        trajectories: vec!["radial".into(), "spiral".into()],
        n_coils: vec![1, 4],
    };

    let registry = BackendRegistry::<f32>::with_builtin();
    for cfg in sweep.expand() {
        let data = load_data::<f32>(&cfg)?;
        let summary = BenchmarkRunner::from_config(&cfg).run(&cfg, &registry, &data)?;
        println!(
            "{:>5} {:>7} coils={} runs={:>5} -> {}",
            cfg.backend.name,
            cfg.trajectory.reference,
            cfg.data.n_coils,
            summary.total_runs(),
            summary.result_path.display()
        );
    }

    println!();
    println!(
        "{:<8}{:<9}{:>6}{:>6}{:>14}{:>14}{:>12}",
        "backend", "task", "coils", "runs", "time/coil s", "peak GiB", "GiB/coil"
    );
    for s in summarize(&read_dir_records(&output_dir)?) {
        println!(
            "{:<8}{:<9}{:>6}{:>6}{:>14.6}{:>14.3}{:>12.3}",
            s.backend, s.task, s.n_coils, s.runs, s.coil_time, s.mem_peak, s.coil_mem
        );
    }
    Ok(())
}
