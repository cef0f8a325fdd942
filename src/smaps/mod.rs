//! Coil sensitivity maps for multi-coil synthetic data
//!
//! - `birdcage`: the closed-form simulator
//! - `cache`: the on-disk cache keyed by `(n_coils, shape)`

pub mod birdcage;
pub mod cache;

pub use birdcage::{
    CoilElement, DEFAULT_COILS_PER_RING, DEFAULT_RING_RADIUS, MIN_COIL_DISTANCE, simulate,
};
pub use cache::{CACHE_DIR_ENV, SmapsCache};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::shape::VolumeShape;
use crate::tensor::ComplexTensor;

/// `(n_coils, *volume)` complex sensitivities, RSS-normalised across coils
pub type SensitivityMaps<T> = ComplexTensor<T>;

/// Receive antenna model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Antenna {
    #[default]
    Birdcage,
}

impl fmt::Display for Antenna {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Antenna::Birdcage => write!(f, "birdcage"),
        }
    }
}

impl FromStr for Antenna {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "birdcage" => Ok(Antenna::Birdcage),
            other => Err(BenchError::UnsupportedAntenna(other.to_string())),
        }
    }
}

/// Sensitivity maps for `n_coils` elements of `antenna` over `shape`
///
/// The birdcage puts every coil on a single ring. Results go through `cache`.
/// # Errors
/// simulation and cache errors
pub fn get_smaps<T: Real>(
    shape: &VolumeShape,
    n_coils: usize,
    antenna: Antenna,
    cache: &SmapsCache,
) -> Result<SensitivityMaps<T>> {
    if n_coils == 0 {
        return Err(BenchError::InvalidParameter("n_coils must be positive".into()));
    }
    match antenna {
        Antenna::Birdcage => cache.load_or_compute(n_coils, shape, || {
            simulate::<T>(&shape.with_coils(n_coils), DEFAULT_RING_RADIUS, n_coils)
        }),
    }
}
