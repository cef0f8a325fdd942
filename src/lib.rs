//! Benchmark harness for NUFFT-based MRI reconstruction back-ends
//!
//! The crate measures how long back-ends take to run the forward transform,
//! the adjoint transform and the data-consistency gradient over a trajectory,
//! while sampling process and GPU resources, and appends one CSV row per run.
//! Multi-coil inputs are synthesized with an analytic birdcage coil model.
//!
//! ```ignore
//! use nufft_bench::{BackendRegistry, BenchmarkRunner, RunConfig, load_data};
//!
//! let cfg = RunConfig::default();
//! let data = load_data::<f32>(&cfg)?;
//! let summary = BenchmarkRunner::from_config(&cfg)
//!     .run(&cfg, &BackendRegistry::with_builtin(), &data)?;
//! println!("{} runs in {}", summary.total_runs(), summary.result_path.display());
//! ```

pub mod config;
pub mod data;
pub mod dtype;
pub mod error;
pub mod gpu;
pub mod io;
pub mod logging;
pub mod monitor;
pub mod operator;
pub mod results;
pub mod runner;
pub mod shape;
pub mod smaps;
pub mod tensor;
pub mod trajectory;

pub use config::{
    BackendConfig, DataConfig, MonitorConfig, RunConfig, Sweep, Task, TrajectoryConfig,
};
pub use data::{BenchmarkData, load_data};
pub use dtype::{Precision, Real};
pub use error::{BenchError, Result};
pub use monitor::{MonitorSession, PerfLog, PerfScope, ResourceMonitor, Samples};
pub use operator::{
    BackendRegistry, NdftFactory, NoopFactory, NufftOperator, OperatorFactory, OperatorParams,
    ZIndex,
};
pub use results::{ResultWriter, RunRecord, TaskSummary, read_records, summarize};
pub use runner::{BenchmarkRunner, RunSummary};
pub use shape::VolumeShape;
pub use smaps::{Antenna, SensitivityMaps, SmapsCache, get_smaps};
pub use tensor::ComplexTensor;
pub use trajectory::{Trajectory, TrajectoryParams, TrajectorySpec};
