//! Synthetic benchmark inputs
//!
//! Builds the phantom image, the noise k-space and (for multi-coil runs) the
//! sensitivity maps a benchmark feeds to the back-end. None of it is meant to
//! be physically meaningful; only the shapes and the numeric type matter.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::io::load_tensor;
use crate::shape::VolumeShape;
use crate::smaps::{SensitivityMaps, get_smaps};
use crate::tensor::ComplexTensor;
use crate::trajectory::{Trajectory, TrajectorySource};

/// Everything a benchmark run consumes
#[derive(Debug, Clone)]
pub struct BenchmarkData<T: Real> {
    /// `shape`, or `(n_coils, *shape)` when the maps were applied to it
    pub image: ComplexTensor<T>,
    /// `(n_coils, n_samples)`
    pub kspace: ComplexTensor<T>,
    pub trajectory: Trajectory,
    /// Present only in sense mode with more than one coil
    pub smaps: Option<Arc<SensitivityMaps<T>>>,
    pub shape: VolumeShape,
    pub n_coils: usize,
}

impl<T: Real> BenchmarkData<T> {
    #[must_use]
    pub fn uses_sense(&self) -> bool {
        self.smaps.is_some()
    }
}

/// Build the inputs described by `cfg`
///
/// `T` must match `cfg.data.precision`. The benchmark volume is the
/// trajectory's `img_size`; a phantom file of another shape is kept as-is.
/// # Errors
/// `PrecisionMismatch`, trajectory and phantom loading errors, sensitivity
/// map errors, and `InvalidShape` when a mismatched phantom has to be
/// multiplied by the coil maps
pub fn load_data<T: Real>(cfg: &RunConfig) -> Result<BenchmarkData<T>> {
    if cfg.data.precision != T::PRECISION {
        return Err(BenchError::PrecisionMismatch {
            expected: cfg.data.precision,
            actual: T::PRECISION,
        });
    }
    if cfg.data.n_coils == 0 {
        return Err(BenchError::InvalidParameter("n_coils must be positive".into()));
    }

    let source = TrajectorySource::from_reference(&cfg.trajectory.reference);
    let (mut trajectory, params) = source.load(&cfg.trajectory.dir, &cfg.trajectory.spec)?;
    if cfg.data.precision.is_single() {
        trajectory = trajectory.to_single_precision();
    }

    // The volume always follows the trajectory; a mismatched phantom is passed
    // through untouched and only fails where it meets the coil maps
    let shape = params.img_size.clone();
    let image = match &cfg.data.file {
        Some(path) => {
            let phantom = load_tensor::<T, _>(path)?;
            if phantom.shape() != shape.dims() {
                warn!(
                    file = %path.display(),
                    phantom = ?phantom.shape(),
                    trajectory = %shape,
                    "phantom shape differs from the trajectory image size, using it as-is"
                );
            }
            phantom
        }
        None => ComplexTensor::rand(shape.dims()),
    };

    let n_coils = cfg.data.n_coils;
    let kspace = ComplexTensor::randn(&[n_coils, trajectory.n_samples()]);

    let (image, smaps) = if n_coils > 1 {
        let maps: SensitivityMaps<T> =
            get_smaps(&shape, n_coils, cfg.data.antenna, &cfg.data.cache())?;
        if cfg.data.sense {
            (image, Some(Arc::new(maps)))
        } else {
            (image.broadcast_mul(&maps)?, None)
        }
    } else {
        (image, None)
    };

    debug!(
        shape = %shape,
        n_coils,
        n_samples = trajectory.n_samples(),
        sense = smaps.is_some(),
        precision = %T::PRECISION,
        "benchmark data ready"
    );

    Ok(BenchmarkData {
        image,
        kspace,
        trajectory,
        smaps,
        shape,
        n_coils,
    })
}
