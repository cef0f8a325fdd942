//! Closed-form birdcage coil sensitivities
//!
//! Each receive element is modelled as a point source on a ring of radius `r`
//! (in units of the half field of view) around the volume's axial axis. Coils
//! beyond the first `coils_per_ring` start a new ring, and the ring stack is
//! centred on the axial midpoint. The sensitivity of a coil at a voxel is
//! `exp(i·phi) / distance`, after which the whole set is normalised so the
//! root-sum-of-squares across coils is 1 everywhere.
//!
//! Follows the analytic model used by SigPy's `birdcage_maps`.

use std::f64::consts::PI;

use num_complex::Complex;

use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::tensor::ComplexTensor;

/// Default ring radius relative to the half field of view
pub const DEFAULT_RING_RADIUS: f64 = 1.5;

/// Default number of coil elements per ring
pub const DEFAULT_COILS_PER_RING: usize = 8;

/// Smallest voxel-to-coil distance used in the `1/r` magnitude
pub const MIN_COIL_DISTANCE: f64 = 1e-6;

/// Position and phase of one coil element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoilElement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub phase: f64,
}

impl CoilElement {
    /// Geometry of coil `c` out of `n_coils`
    #[must_use]
    pub fn new(c: usize, n_coils: usize, r: f64, coils_per_ring: usize) -> Self {
        let step = 2.0 * PI / coils_per_ring as f64;
        let ring = (c / coils_per_ring) as f64;
        let n_rings = n_coils.div_ceil(coils_per_ring) as f64;
        let angle = c as f64 * step;
        Self {
            x: r * angle.cos(),
            y: r * angle.sin(),
            z: ring - 0.5 * (n_rings - 1.0),
            phase: -(c as f64 + ring) * step,
        }
    }

    /// Complex sensitivity at normalized voxel coordinates in [-1, 1]
    #[must_use]
    pub fn sensitivity(&self, x: f64, y: f64, z: f64) -> Complex<f64> {
        let x_co = x - self.x;
        let y_co = y - self.y;
        let z_co = z - self.z;
        let rr = (x_co * x_co + y_co * y_co + z_co * z_co)
            .sqrt()
            .max(MIN_COIL_DISTANCE);
        let phi = x_co.atan2(-y_co) + self.phase;
        Complex::from_polar(1.0 / rr, phi)
    }
}

/// Normalized coordinate of index `i` along an axis of length `n`
#[inline]
fn normalized(i: usize, n: usize) -> f64 {
    let half = n as f64 / 2.0;
    (i as f64 - half) / half
}

/// Simulate birdcage sensitivities for a `(coils, z, y, x)` or `(coils, y, x)` shape.
///
/// For the 3-element form the volume is treated as a single slice (`nz = 1`)
/// and the result keeps the requested `(coils, y, x)` shape.
/// # Errors
/// `InvalidShape` for any other rank or a zero extent, `InvalidParameter` for
/// a zero `coils_per_ring`
pub fn simulate<T: Real>(
    shape: &[usize],
    r: f64,
    coils_per_ring: usize,
) -> Result<ComplexTensor<T>> {
    let (nc, nz, ny, nx) = match *shape {
        [nc, nz, ny, nx] => (nc, nz, ny, nx),
        [nc, ny, nx] => (nc, 1, ny, nx),
        _ => {
            return Err(BenchError::invalid_shape(
                shape,
                "shape must be [nc, nz, ny, nx] or [nc, ny, nx]",
            ));
        }
    };
    if shape.contains(&0) {
        return Err(BenchError::invalid_shape(shape, "extents must be positive"));
    }
    if coils_per_ring == 0 {
        return Err(BenchError::InvalidParameter(
            "coils_per_ring must be at least 1".into(),
        ));
    }

    let volume = nz * ny * nx;
    let mut out = vec![Complex::new(0.0_f64, 0.0); nc * volume];

    for (c, coil_map) in out.chunks_mut(volume).enumerate() {
        let coil = CoilElement::new(c, nc, r, coils_per_ring);
        let mut idx = 0;
        for z in 0..nz {
            let zn = normalized(z, nz);
            for y in 0..ny {
                let yn = normalized(y, ny);
                for x in 0..nx {
                    coil_map[idx] = coil.sensitivity(normalized(x, nx), yn, zn);
                    idx += 1;
                }
            }
        }
    }

    // Root-sum-of-squares normalisation across the coil axis
    let mut rss = vec![0.0_f64; volume];
    for coil_map in out.chunks(volume) {
        for (acc, s) in rss.iter_mut().zip(coil_map) {
            *acc += s.norm_sqr();
        }
    }
    for coil_map in out.chunks_mut(volume) {
        for (s, acc) in coil_map.iter_mut().zip(&rss) {
            *s /= acc.sqrt();
        }
    }

    let data = out
        .into_iter()
        .map(|s| Complex::new(T::from_real(s.re), T::from_real(s.im)))
        .collect();
    ComplexTensor::new(data, shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coil_geometry_single_ring() {
        // Four coils on one ring: quarter turns, no axial offset
        let c1 = CoilElement::new(1, 4, 1.5, 4);
        assert!(c1.x.abs() < 1e-12);
        assert!((c1.y - 1.5).abs() < 1e-12);
        assert_eq!(c1.z, 0.0);
        assert!((c1.phase + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_coil_geometry_ring_stack() {
        // 12 coils, 8 per ring: two rings centred at -0.5 and +0.5
        let first = CoilElement::new(0, 12, 1.5, 8);
        let second = CoilElement::new(8, 12, 1.5, 8);
        assert_eq!(first.z, -0.5);
        assert_eq!(second.z, 0.5);
        // Coil 8 sits at angle 2π but its phase gains one extra step per ring
        assert!((second.phase + 9.0 * 2.0 * PI / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalization_2d() {
        let maps = simulate::<f64>(&[5, 16, 12], DEFAULT_RING_RADIUS, DEFAULT_COILS_PER_RING)
            .unwrap();
        assert_eq!(maps.shape(), &[5, 16, 12]);
        for v in maps.rss_first_axis() {
            assert!((v - 1.0).abs() < 1e-12, "rss = {v}");
        }
    }

    #[test]
    fn test_normalization_3d_single_precision() {
        let maps = simulate::<f32>(&[3, 6, 8, 8], 1.5, 3).unwrap();
        assert_eq!(maps.shape(), &[3, 6, 8, 8]);
        for v in maps.rss_first_axis() {
            assert!((v - 1.0).abs() < 1e-5, "rss = {v}");
        }
    }

    #[test]
    fn test_single_coil_is_pure_phase() {
        let maps = simulate::<f64>(&[1, 4, 4], 1.5, 8).unwrap();
        for s in maps.data() {
            assert!((s.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_coincident_voxel_is_finite() {
        // Zero radius puts coil 0 at the grid centre of a 2D volume, where the
        // distance to the voxel (y, x) = (n/2, n/2) would be exactly zero in
        // the transverse plane; in 3D with nz = 2 the centre slice hits z = 0 too.
        let maps = simulate::<f64>(&[1, 2, 4, 4], 0.0, 8).unwrap();
        assert!(maps.data().iter().all(|s| s.re.is_finite() && s.im.is_finite()));
    }

    #[test]
    fn test_rejects_bad_rank() {
        assert!(matches!(
            simulate::<f32>(&[4, 4], 1.5, 8),
            Err(BenchError::InvalidShape { .. })
        ));
        assert!(simulate::<f32>(&[1, 2, 3, 4, 5], 1.5, 8).is_err());
        assert!(simulate::<f32>(&[2, 4, 4], 1.5, 0).is_err());
    }
}
