//! Benchmark run configuration
//!
//! A [`RunConfig`] describes one benchmark invocation. It derives `serde` so an
//! outer loader (YAML, JSON, CLI) can build it; every field has a default that
//! mirrors the harness defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dtype::Precision;
use crate::error::{BenchError, Result};
use crate::smaps::{Antenna, SmapsCache};
use crate::trajectory::{TrajectorySpec, trajectory_label};

/// One timed computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// `op(image)`
    Forward,
    /// `adj_op(kspace)`
    Adjoint,
    /// `data_consistency(image, kspace)`
    Grad,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::Forward, Task::Adjoint, Task::Grad];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Task::Forward => "forward",
            Task::Adjoint => "adjoint",
            Task::Grad => "grad",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Task {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(Task::Forward),
            "adjoint" => Ok(Task::Adjoint),
            "grad" => Ok(Task::Grad),
            other => Err(BenchError::UnknownTask(other.to_string())),
        }
    }
}

/// Back-end selection and its numerical parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub name: String,
    pub eps: f64,
    pub upsampfac: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "ndft".to_string(),
            eps: 1e-6,
            upsampfac: 2.0,
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Where the trajectory comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// A `.bin` trajectory file, or the name of a procedural trajectory
    pub reference: String,
    /// Directory that relative trajectory files resolve against
    pub dir: PathBuf,
    /// Parameters for procedural trajectories
    pub spec: TrajectorySpec,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            reference: "radial".to_string(),
            dir: PathBuf::from("."),
            spec: TrajectorySpec::default(),
        }
    }
}

/// Synthetic data settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub n_coils: usize,
    pub precision: Precision,
    /// Hand the sensitivity maps to the back-end instead of baking them into the image
    pub sense: bool,
    /// Optional phantom file, uniform noise otherwise
    pub file: Option<PathBuf>,
    pub antenna: Antenna,
    /// Sensitivity map cache directory, see [`SmapsCache::from_env`] when unset
    pub smaps_cache: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            n_coils: 1,
            precision: Precision::Complex64,
            sense: false,
            file: None,
            antenna: Antenna::Birdcage,
            smaps_cache: None,
        }
    }
}

impl DataConfig {
    #[must_use]
    pub fn cache(&self) -> SmapsCache {
        match &self.smaps_cache {
            Some(dir) => SmapsCache::new(dir),
            None => SmapsCache::from_env(),
        }
    }
}

/// Resource monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in seconds
    pub interval: f64,
    /// Also sample GPU memory and utilisation
    pub gpu: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: 0.1,
            gpu: false,
        }
    }
}

/// Full description of one benchmark invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub backend: BackendConfig,
    pub trajectory: TrajectoryConfig,
    pub data: DataConfig,
    /// Task names, checked by [`RunConfig::tasks`]
    pub tasks: Vec<String>,
    /// Wall-clock budget per task, in seconds
    pub max_time: f64,
    pub monitor: MonitorConfig,
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            trajectory: TrajectoryConfig::default(),
            data: DataConfig::default(),
            tasks: Task::ALL.iter().map(|t| t.name().to_string()).collect(),
            max_time: 60.0,
            monitor: MonitorConfig::default(),
            output_dir: PathBuf::from("results"),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BenchError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

impl RunConfig {
    /// Parse every task name, failing on the first unknown one
    /// # Errors
    /// `UnknownTask`
    pub fn tasks(&self) -> Result<Vec<Task>> {
        self.tasks.iter().map(|t| t.parse()).collect()
    }

    /// Check the whole configuration before any work starts
    /// # Errors
    /// `UnknownTask` or `InvalidParameter`
    pub fn validate(&self) -> Result<Vec<Task>> {
        let tasks = self.tasks()?;
        if self.backend.name.is_empty() {
            return Err(BenchError::InvalidParameter("backend name is empty".into()));
        }
        positive("eps", self.backend.eps)?;
        positive("upsampfac", self.backend.upsampfac)?;
        positive("monitor interval", self.monitor.interval)?;
        if !(self.max_time.is_finite() && self.max_time >= 0.0) {
            return Err(BenchError::InvalidParameter(format!(
                "max_time must be a non-negative number of seconds, got {}",
                self.max_time
            )));
        }
        if self.data.n_coils == 0 {
            return Err(BenchError::InvalidParameter("n_coils must be positive".into()));
        }
        Ok(tasks)
    }

    #[must_use]
    pub fn max_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_time.max(0.0))
    }

    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs_f64(self.monitor.interval.max(1e-3))
    }

    /// Short trajectory name used in result file names
    #[must_use]
    pub fn trajectory_name(&self) -> String {
        trajectory_label(&self.trajectory.reference)
    }

    /// `{backend}_{upsampfac}_{trajectory}_{eps}_{n_coils}.csv`
    #[must_use]
    pub fn result_file_name(&self) -> String {
        format!(
            "{}_{:?}_{}_{:?}_{}.csv",
            self.backend.name,
            self.backend.upsampfac,
            self.trajectory_name(),
            self.backend.eps,
            self.data.n_coils
        )
    }

    #[must_use]
    pub fn result_path(&self) -> PathBuf {
        self.output_dir.join(self.result_file_name())
    }
}

/// Cartesian sweep over back-ends, trajectories and coil counts
///
/// Empty lists keep the base configuration's value for that axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sweep {
    pub base: RunConfig,
    pub backends: Vec<BackendConfig>,
    pub trajectories: Vec<String>,
    pub n_coils: Vec<usize>,
}

impl Sweep {
    /// One configuration per `(backend, trajectory, n_coils)` combination
    #[must_use]
    pub fn expand(&self) -> Vec<RunConfig> {
        let backends = if self.backends.is_empty() {
            vec![self.base.backend.clone()]
        } else {
            self.backends.clone()
        };
        let trajectories = if self.trajectories.is_empty() {
            vec![self.base.trajectory.reference.clone()]
        } else {
            self.trajectories.clone()
        };
        let coils = if self.n_coils.is_empty() {
            vec![self.base.data.n_coils]
        } else {
            self.n_coils.clone()
        };

        let mut configs = Vec::with_capacity(backends.len() * trajectories.len() * coils.len());
        for backend in &backends {
            for reference in &trajectories {
                for &n_coils in &coils {
                    let mut cfg = self.base.clone();
                    cfg.backend = backend.clone();
                    cfg.trajectory.reference.clone_from(reference);
                    cfg.data.n_coils = n_coils;
                    configs.push(cfg);
                }
            }
        }
        configs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_parsing() {
        assert_eq!("grad".parse::<Task>().unwrap(), Task::Grad);
        assert!(matches!(
            "backward".parse::<Task>(),
            Err(BenchError::UnknownTask(ref t)) if t == "backward"
        ));
        assert_eq!(Task::Adjoint.to_string(), "adjoint");
    }

    #[test]
    fn test_defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.backend.eps, 1e-6);
        assert_eq!(cfg.backend.upsampfac, 2.0);
        assert_eq!(cfg.data.precision, Precision::Complex64);
        assert_eq!(cfg.max_time(), Duration::from_secs(60));
        assert_eq!(cfg.validate().unwrap(), Task::ALL.to_vec());
    }

    #[test]
    fn test_validate_rejects_unknown_task_first() {
        let cfg = RunConfig {
            tasks: vec!["forward".into(), "backward".into()],
            max_time: -1.0,
            ..RunConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::UnknownTask(_))));
    }

    #[test]
    fn test_validate_parameters() {
        let mut cfg = RunConfig::default();
        cfg.backend.eps = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RunConfig::default();
        cfg.data.n_coils = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RunConfig::default();
        cfg.max_time = f64::NAN;
        assert!(cfg.validate().is_err());

        let cfg = RunConfig {
            max_time: 0.0,
            ..RunConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_result_file_name() {
        let mut cfg = RunConfig::default();
        cfg.backend = BackendConfig::named("finufft");
        cfg.trajectory.reference = "./trajs/floret_256x256x176_0.5.bin".into();
        cfg.data.n_coils = 32;
        assert_eq!(cfg.result_file_name(), "finufft_2.0_floret_1e-6_32.csv");
        assert_eq!(
            cfg.result_path(),
            PathBuf::from("results/finufft_2.0_floret_1e-6_32.csv")
        );
    }

    #[test]
    fn test_sweep_expansion() {
        let sweep = Sweep {
            base: RunConfig::default(),
            backends: vec![BackendConfig::named("noop"), BackendConfig::named("ndft")],
            trajectories: vec!["radial".into(), "spiral".into()],
            n_coils: vec![1, 8, 32],
        };
        let configs = sweep.expand();
        assert_eq!(configs.len(), 12);
        assert_eq!(configs[0].backend.name, "noop");
        assert_eq!(configs[0].data.n_coils, 1);
        assert_eq!(configs[11].backend.name, "ndft");
        assert_eq!(configs[11].trajectory.reference, "spiral");
        assert_eq!(configs[11].data.n_coils, 32);

        assert_eq!(Sweep::default().expand(), vec![RunConfig::default()]);
    }
}
