//! Non-Cartesian k-space trajectories
//!
//! A trajectory is a set of shots, each holding `samples_per_shot` points in
//! `dim`-dimensional k-space, with coordinates normalised to `[-0.5, 0.5)`.
//! Trajectories are either read from a binary trajectory file (`.bin`) or built
//! procedurally by name.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::dtype::Precision;
use crate::error::{BenchError, Result};
use crate::io::{load_encoded, save_encoded};
use crate::shape::VolumeShape;

/// File extension of persisted trajectories
pub const TRAJECTORY_EXTENSION: &str = "bin";

const FORMAT_VERSION: u32 = 1;

/// Flat sample coordinates, `shots * samples_per_shot * dim` values
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Samples {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Samples {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Samples::F32(v) => v.len(),
            Samples::F64(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<f64> {
        match self {
            Samples::F32(v) => v.get(i).map(|&x| f64::from(x)),
            Samples::F64(v) => v.get(i).copied(),
        }
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        match self {
            Samples::F32(_) => Precision::Complex64,
            Samples::F64(_) => Precision::Complex128,
        }
    }
}

/// Sample locations of one acquisition
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Trajectory {
    samples: Samples,
    shots: usize,
    samples_per_shot: usize,
    dim: usize,
}

impl Trajectory {
    /// # Errors
    /// `InvalidParameter` if `samples` does not hold `shots * samples_per_shot * dim`
    /// values or `dim` is not 2 or 3
    pub fn new(
        samples: Samples,
        shots: usize,
        samples_per_shot: usize,
        dim: usize,
    ) -> Result<Self> {
        if !(2..=3).contains(&dim) {
            return Err(BenchError::InvalidParameter(format!(
                "trajectory dimension must be 2 or 3, got {dim}"
            )));
        }
        let expected = shots * samples_per_shot * dim;
        if samples.len() != expected {
            return Err(BenchError::InvalidParameter(format!(
                "trajectory ({shots}, {samples_per_shot}, {dim}) needs {expected} values, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            shots,
            samples_per_shot,
            dim,
        })
    }

    #[must_use]
    pub fn shots(&self) -> usize {
        self.shots
    }

    #[must_use]
    pub fn samples_per_shot(&self) -> usize {
        self.samples_per_shot
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Total number of k-space points across all shots
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.shots * self.samples_per_shot
    }

    /// `(shots, samples_per_shot, dim)`
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        [self.shots, self.samples_per_shot, self.dim]
    }

    #[must_use]
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Coordinates of point `k`, widened to `f64`
    #[must_use]
    pub fn point(&self, k: usize) -> Vec<f64> {
        (0..self.dim)
            .filter_map(|d| self.samples.get(k * self.dim + d))
            .collect()
    }

    /// Downcast coordinates to `f32`
    #[must_use]
    pub fn to_single_precision(self) -> Self {
        let samples = match self.samples {
            Samples::F64(v) => Samples::F32(v.into_iter().map(|x| x as f32).collect()),
            single @ Samples::F32(_) => single,
        };
        Self { samples, ..self }
    }
}

/// Acquisition parameters stored alongside a trajectory
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct TrajectoryParams {
    pub img_size: VolumeShape,
    pub fov: Vec<f64>,
}

#[derive(Encode, Decode)]
struct TrajectoryFile {
    version: u32,
    params: TrajectoryParams,
    trajectory: Trajectory,
}

fn with_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == TRAJECTORY_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(TRAJECTORY_EXTENSION);
        PathBuf::from(name)
    }
}

/// Persist a trajectory with its field of view and image size
///
/// `.bin` is appended to `path` when missing; the written path is returned.
/// # Errors
/// `InvalidParameter` if `fov` and `img_size` ranks disagree with the
/// trajectory dimension, or file errors
pub fn write_trajectory<P: AsRef<Path>>(
    trajectory: &Trajectory,
    fov: &[f64],
    img_size: &VolumeShape,
    path: P,
) -> Result<PathBuf> {
    if fov.len() != trajectory.dim() || img_size.ndim() != trajectory.dim() {
        return Err(BenchError::InvalidParameter(format!(
            "{}D trajectory needs a {}D fov and image size, got {:?} and {}",
            trajectory.dim(),
            trajectory.dim(),
            fov,
            img_size
        )));
    }
    let path = with_extension(path.as_ref());
    let file = TrajectoryFile {
        version: FORMAT_VERSION,
        params: TrajectoryParams {
            img_size: img_size.clone(),
            fov: fov.to_vec(),
        },
        trajectory: trajectory.clone(),
    };
    save_encoded(&file, &path)?;
    Ok(path)
}

/// Read a trajectory written by [`write_trajectory`]
/// # Errors
/// file and decoding errors, or an unsupported format version
pub fn read_trajectory<P: AsRef<Path>>(path: P) -> Result<(Trajectory, TrajectoryParams)> {
    let file: TrajectoryFile = load_encoded(path.as_ref())?;
    if file.version != FORMAT_VERSION {
        return Err(BenchError::Cache(format!(
            "{}: unsupported trajectory format version {}",
            path.as_ref().display(),
            file.version
        )));
    }
    Ok((file.trajectory, file.params))
}

// ===== PROCEDURAL TRAJECTORIES =====

/// Parameters for trajectories built by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectorySpec {
    /// Number of shots (per stack for stacked trajectories)
    pub shots: usize,
    pub samples_per_shot: usize,
    /// Spiral turns per shot
    pub revolutions: f64,
    /// Number of kz partitions for stacked trajectories
    pub stacks: usize,
    pub img_size: Vec<usize>,
    /// Voxel size, the field of view is `img_size * resolution`
    pub resolution: f64,
}

impl Default for TrajectorySpec {
    fn default() -> Self {
        Self {
            shots: 64,
            samples_per_shot: 1024,
            revolutions: 7.0,
            stacks: 32,
            img_size: vec![256, 256],
            resolution: 0.5,
        }
    }
}

impl TrajectorySpec {
    /// Base file name used when persisting, e.g. `spiral_256x256_0.5`
    #[must_use]
    pub fn file_stem(&self, name: &str) -> String {
        let dims: Vec<String> = self.img_size.iter().map(ToString::to_string).collect();
        format!("{name}_{}_{}", dims.join("x"), self.resolution)
    }

    fn params(&self) -> Result<TrajectoryParams> {
        let img_size = VolumeShape::new(&self.img_size)?;
        let fov = self
            .img_size
            .iter()
            .map(|&n| n as f64 * self.resolution)
            .collect();
        Ok(TrajectoryParams { img_size, fov })
    }

    fn require_dim(&self, name: &str, dim: usize) -> Result<()> {
        if self.img_size.len() != dim {
            return Err(BenchError::InvalidParameter(format!(
                "{name} trajectory needs a {dim}D image size, got {:?}",
                self.img_size
            )));
        }
        if self.shots == 0 || self.samples_per_shot == 0 {
            return Err(BenchError::InvalidParameter(
                "shots and samples_per_shot must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parametric position in `[0, 1]` of sample `i` out of `n`
fn ramp(i: usize, n: usize) -> f64 {
    if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 }
}

fn radial_2d(spec: &TrajectorySpec) -> Vec<f64> {
    let mut out = Vec::with_capacity(spec.shots * spec.samples_per_shot * 2);
    for s in 0..spec.shots {
        let theta = PI * s as f64 / spec.shots as f64;
        for i in 0..spec.samples_per_shot {
            let r = ramp(i, spec.samples_per_shot) - 0.5;
            out.push(r * theta.cos());
            out.push(r * theta.sin());
        }
    }
    out
}

fn spiral_2d(spec: &TrajectorySpec) -> Vec<f64> {
    let mut out = Vec::with_capacity(spec.shots * spec.samples_per_shot * 2);
    for s in 0..spec.shots {
        let offset = 2.0 * PI * s as f64 / spec.shots as f64;
        for i in 0..spec.samples_per_shot {
            let t = ramp(i, spec.samples_per_shot);
            // Keep the outermost point strictly inside [-0.5, 0.5)
            let r = 0.5 * t * (1.0 - 1e-6);
            let theta = 2.0 * PI * spec.revolutions * t + offset;
            out.push(r * theta.cos());
            out.push(r * theta.sin());
        }
    }
    out
}

/// Build a trajectory by name: `radial`, `spiral` (2D) or `stack_of_spiral` (3D)
/// # Errors
/// `UnknownTrajectory` for other names, `InvalidParameter` for inconsistent specs
pub fn generate(name: &str, spec: &TrajectorySpec) -> Result<(Trajectory, TrajectoryParams)> {
    let trajectory = match name {
        "radial" => {
            spec.require_dim(name, 2)?;
            Trajectory::new(
                Samples::F64(radial_2d(spec)),
                spec.shots,
                spec.samples_per_shot,
                2,
            )?
        }
        "spiral" => {
            spec.require_dim(name, 2)?;
            Trajectory::new(
                Samples::F64(spiral_2d(spec)),
                spec.shots,
                spec.samples_per_shot,
                2,
            )?
        }
        "stack_of_spiral" => {
            spec.require_dim(name, 3)?;
            if spec.stacks == 0 {
                return Err(BenchError::InvalidParameter("stacks must be positive".into()));
            }
            let plane = spiral_2d(spec);
            let mut out = Vec::with_capacity(plane.len() / 2 * 3 * spec.stacks);
            for j in 0..spec.stacks {
                let kz = -0.5 + (j as f64 + 0.5) / spec.stacks as f64;
                for xy in plane.chunks(2) {
                    out.extend_from_slice(&[kz, xy[0], xy[1]]);
                }
            }
            Trajectory::new(
                Samples::F64(out),
                spec.shots * spec.stacks,
                spec.samples_per_shot,
                3,
            )?
        }
        other => return Err(BenchError::UnknownTrajectory(other.to_string())),
    };
    Ok((trajectory, spec.params()?))
}

/// Short trajectory label used in result file names: the file basename up to
/// its first underscore (`trajs/floret_256x256x176_0.5.bin` → `floret`)
#[must_use]
pub fn trajectory_label(reference: &str) -> String {
    let base = reference.rsplit('/').next().unwrap_or(reference);
    base.split('_').next().unwrap_or(base).to_string()
}

/// Where a benchmark trajectory comes from, chosen by file extension
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectorySource {
    File(PathBuf),
    Named(String),
}

impl TrajectorySource {
    #[must_use]
    pub fn from_reference(reference: &str) -> Self {
        let path = Path::new(reference);
        if path.extension().is_some_and(|e| e == TRAJECTORY_EXTENSION) {
            TrajectorySource::File(path.to_path_buf())
        } else {
            TrajectorySource::Named(reference.to_string())
        }
    }

    /// Read or build the trajectory; relative file paths resolve against `base_dir`
    /// # Errors
    /// see [`read_trajectory`] and [`generate`]
    pub fn load(
        &self,
        base_dir: &Path,
        spec: &TrajectorySpec,
    ) -> Result<(Trajectory, TrajectoryParams)> {
        match self {
            TrajectorySource::File(path) => read_trajectory(base_dir.join(path)),
            TrajectorySource::Named(name) => generate(name, spec),
        }
    }
}
