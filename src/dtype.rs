//! Numerical precision support for benchmark data
//!
//! Back-ends are benchmarked either in single precision (`complex64`, pairs of
//! `f32`) or double precision (`complex128`, pairs of `f64`). The `Precision`
//! tag travels with configurations and result rows, while the `Real` trait lets
//! the data generators and operators be written once for both widths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BenchError;

/// Supported complex sample types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Precision {
    /// Single precision complex (two `f32`)
    #[default]
    #[serde(rename = "complex64")]
    Complex64 = 0,
    /// Double precision complex (two `f64`)
    #[serde(rename = "complex128")]
    Complex128 = 1,
}

impl Precision {
    /// Returns the size in bytes of a single complex element
    #[must_use]
    pub fn size_of(&self) -> usize {
        match self {
            Precision::Complex64 => 8,
            Precision::Complex128 => 16,
        }
    }

    /// Returns the numpy-style name of this precision
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Precision::Complex64 => "complex64",
            Precision::Complex128 => "complex128",
        }
    }

    /// Name of the real component type
    #[must_use]
    pub fn real_name(&self) -> &'static str {
        match self {
            Precision::Complex64 => "float32",
            Precision::Complex128 => "float64",
        }
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(self, Precision::Complex64)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Precision {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complex64" | "c64" => Ok(Precision::Complex64),
            "complex128" | "c128" => Ok(Precision::Complex128),
            other => Err(BenchError::InvalidParameter(format!(
                "unknown precision {other:?}"
            ))),
        }
    }
}

/// Real scalar type backing one complex component.
pub trait Real:
    num_traits::Float + Default + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Precision of `Complex<Self>`
    const PRECISION: Precision;

    /// Narrowing (or identity) conversion from `f64`
    fn from_real(value: f64) -> Self;

    /// Widening (or identity) conversion to `f64`
    fn as_f64(self) -> f64;
}

impl Real for f32 {
    const PRECISION: Precision = Precision::Complex64;

    #[inline]
    fn from_real(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Real for f64 {
    const PRECISION: Precision = Precision::Complex128;

    #[inline]
    fn from_real(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
