//! Timed benchmark loop
//!
//! For every task of a configuration, the runner repeatedly builds a fresh
//! operator, executes the task under the resource monitor and a named timer,
//! and appends the measurements to the configuration's result file. Each task
//! runs at least once and keeps going until its wall-clock budget is spent.

use std::hint::black_box;
use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::config::{RunConfig, Task};
use crate::data::BenchmarkData;
use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::gpu;
use crate::monitor::{PerfLog, ResourceMonitor};
use crate::operator::{BackendRegistry, NufftOperator, OperatorParams, ZIndex};
use crate::results::{ConfigColumns, ResultWriter, RunMetrics, RunRecord};

/// What a finished benchmark wrote
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub result_path: PathBuf,
    /// Records written per task, in execution order
    pub runs: Vec<(Task, usize)>,
}

impl RunSummary {
    #[must_use]
    pub fn total_runs(&self) -> usize {
        self.runs.iter().map(|(_, n)| n).sum()
    }

    #[must_use]
    pub fn runs_for(&self, task: Task) -> usize {
        self.runs
            .iter()
            .filter(|(t, _)| *t == task)
            .map(|(_, n)| n)
            .sum()
    }
}

fn execute<T: Real>(task: Task, op: &dyn NufftOperator<T>, data: &BenchmarkData<T>) -> Result<()> {
    match task {
        Task::Forward => black_box(op.op(&data.image)?),
        Task::Adjoint => black_box(op.adj_op(&data.kspace)?),
        Task::Grad => black_box(op.data_consistency(&data.image, &data.kspace)?),
    };
    Ok(())
}

/// Drives benchmark configurations
pub struct BenchmarkRunner {
    monitor: ResourceMonitor,
    perf: PerfLog,
}

impl BenchmarkRunner {
    #[must_use]
    pub fn new(monitor: ResourceMonitor) -> Self {
        Self {
            monitor,
            perf: PerfLog::new(),
        }
    }

    /// Runner whose monitor follows `cfg.monitor`
    #[must_use]
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self::new(ResourceMonitor::new(cfg.monitor_interval(), cfg.monitor.gpu))
    }

    #[must_use]
    pub fn perf(&self) -> &PerfLog {
        &self.perf
    }

    /// Run every task of `cfg` against the back-end it names
    ///
    /// The configuration is validated before any operator is built, so an
    /// unknown task aborts without writing anything.
    /// # Errors
    /// configuration errors, `UnknownBackend`, back-end failures and result
    /// file errors; a failing run writes no record
    pub fn run<T: Real>(
        &self,
        cfg: &RunConfig,
        registry: &BackendRegistry<T>,
        data: &BenchmarkData<T>,
    ) -> Result<RunSummary> {
        let tasks = cfg.validate()?;
        if cfg.data.precision != T::PRECISION {
            return Err(BenchError::PrecisionMismatch {
                expected: cfg.data.precision,
                actual: T::PRECISION,
            });
        }
        let backend = cfg.backend.name.as_str();
        let factory = registry.get_operator(backend)?;

        let params = OperatorParams {
            n_coils: data.n_coils,
            smaps: data.smaps.clone(),
            eps: cfg.backend.eps,
            upsampfac: cfg.backend.upsampfac,
            z_index: backend.contains("stacked").then_some(ZIndex::Auto),
        };

        let columns = {
            let probe = factory.create(&data.trajectory, &data.shape, &params)?;
            ConfigColumns {
                backend: backend.to_string(),
                eps: cfg.backend.eps,
                upsampfac: cfg.backend.upsampfac,
                n_coils: probe.n_coils(),
                shape: probe.shape().clone(),
                n_samples: probe.n_samples(),
                dim: probe.shape().ndim(),
                sense: probe.uses_sense(),
            }
        };

        let writer = ResultWriter::new(cfg.result_path());
        let budget = cfg.max_time();
        let mut runs = Vec::with_capacity(tasks.len());

        for task in tasks {
            info!(backend, %task, budget_s = budget.as_secs_f64(), "starting task");
            let timer = format!("{backend}_{task}");
            let start = Instant::now();
            let mut run = 0;
            loop {
                let op = factory.create(&data.trajectory, &data.shape, &params)?;
                let samples = {
                    let session = self.monitor.session()?;
                    let scope = self.perf.scope(&timer);
                    execute(task, op.as_ref(), data)?;
                    drop(scope);
                    session.finish()
                };
                drop(op);

                let run_time = self.perf.get_timer(&timer).unwrap_or_default();
                let metrics =
                    RunMetrics::from_samples(task, run, run_time, &samples, self.monitor.gpu());
                writer.append(&RunRecord {
                    config: columns.clone(),
                    metrics,
                })?;

                run += 1;
                if start.elapsed() >= budget {
                    break;
                }
            }
            info!(backend, %task, runs = run, "task done");
            runs.push((task, run));
        }

        gpu::release_memory_pools();

        Ok(RunSummary {
            result_path: writer.path().to_path_buf(),
            runs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::load_data;
    use crate::results::read_records;
    use crate::trajectory::TrajectorySpec;
    use std::time::Duration;

    fn config(dir: &std::path::Path, backend: &str, max_time: f64) -> RunConfig {
        let mut cfg = RunConfig::default();
        cfg.backend.name = backend.into();
        cfg.trajectory.spec = TrajectorySpec {
            shots: 2,
            samples_per_shot: 4,
            img_size: vec![4, 4],
            ..TrajectorySpec::default()
        };
        cfg.data.smaps_cache = Some(dir.join("smaps"));
        cfg.output_dir = dir.join("results");
        cfg.max_time = max_time;
        cfg.monitor.interval = 0.005;
        cfg
    }

    #[test]
    fn test_zero_budget_runs_each_task_once() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "noop", 0.0);
        let data = load_data::<f32>(&cfg).unwrap();
        let runner = BenchmarkRunner::from_config(&cfg);
        let summary = runner
            .run(&cfg, &BackendRegistry::with_builtin(), &data)
            .unwrap();

        assert_eq!(
            summary.runs,
            vec![(Task::Forward, 1), (Task::Adjoint, 1), (Task::Grad, 1)]
        );
        let rows = read_records(&summary.result_path).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.get("run") == Some("0")));
        assert_eq!(rows[0].get("n_samples"), Some("8"));
        assert_eq!(rows[0].get("dim"), Some("2"));
        assert_eq!(rows[2].get("task"), Some("grad"));
    }

    #[test]
    fn test_budget_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), "noop", 0.05);
        cfg.tasks = vec!["adjoint".into()];
        let data = load_data::<f32>(&cfg).unwrap();
        let runner = BenchmarkRunner::from_config(&cfg);

        let start = Instant::now();
        let summary = runner
            .run(&cfg, &BackendRegistry::with_builtin(), &data)
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(summary.runs_for(Task::Adjoint) >= 1);
        assert_eq!(
            read_records(&summary.result_path).unwrap().len(),
            summary.total_runs()
        );
    }

    #[test]
    fn test_unknown_task_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), "noop", 0.0);
        cfg.tasks = vec!["forward".into(), "inverse".into()];
        let data = load_data::<f32>(&cfg).unwrap();
        let err = BenchmarkRunner::from_config(&cfg)
            .run(&cfg, &BackendRegistry::with_builtin(), &data)
            .unwrap_err();
        assert!(matches!(err, BenchError::UnknownTask(ref t) if t == "inverse"));
        assert!(!cfg.result_path().exists());
    }

    #[test]
    fn test_unknown_backend() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "cufinufft", 0.0);
        let data = load_data::<f32>(&cfg).unwrap();
        let err = BenchmarkRunner::from_config(&cfg)
            .run(&cfg, &BackendRegistry::with_builtin(), &data)
            .unwrap_err();
        assert!(matches!(err, BenchError::UnknownBackend(_)));
    }
}
