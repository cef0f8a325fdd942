//! Spatial volume shapes
//!
//! Reconstruction volumes are either 2D `(ny, nx)` or 3D `(nz, ny, nx)`.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BenchError, Result};

/// An ordered tuple of 2 or 3 positive extents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct VolumeShape(Vec<usize>);

impl VolumeShape {
    /// Validate and wrap a list of extents
    /// # Errors
    /// `InvalidShape` when the rank is not 2 or 3 or an extent is zero
    pub fn new(dims: &[usize]) -> Result<Self> {
        if !(2..=3).contains(&dims.len()) {
            return Err(BenchError::invalid_shape(
                dims,
                format!("volume must be 2D or 3D, got rank {}", dims.len()),
            ));
        }
        if dims.contains(&0) {
            return Err(BenchError::invalid_shape(dims, "extents must be positive"));
        }
        Ok(Self(dims.to_vec()))
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Number of voxels
    #[must_use]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Prepend a coil axis: `(n_coils, *self)`
    #[must_use]
    pub fn with_coils(&self, n_coils: usize) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.0.len() + 1);
        dims.push(n_coils);
        dims.extend_from_slice(&self.0);
        dims
    }
}

impl TryFrom<Vec<usize>> for VolumeShape {
    type Error = BenchError;

    fn try_from(dims: Vec<usize>) -> Result<Self> {
        Self::new(&dims)
    }
}

impl From<VolumeShape> for Vec<usize> {
    fn from(shape: VolumeShape) -> Self {
        shape.0
    }
}

/// Tuple display, `(64, 64, 64)`. Used in cache file names and CSV rows.
impl fmt::Display for VolumeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}
