//! NUFFT back-end seam
//!
//! Back-ends plug in through two traits: an [`OperatorFactory`] registered by
//! name in a [`BackendRegistry`], and the [`NufftOperator`] instances it builds
//! for a trajectory. The harness only times the calls; it never checks their
//! numerical accuracy.
//!
//! Two CPU back-ends ship with the crate:
//! - `noop`: validates shapes and returns zero-filled outputs, for measuring
//!   harness overhead
//! - `ndft`: direct non-uniform DFT, an exact but `O(N·K)` reference

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex;

use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::shape::VolumeShape;
use crate::smaps::SensitivityMaps;
use crate::tensor::ComplexTensor;
use crate::trajectory::Trajectory;

/// Handling of the kz axis for stacked trajectories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZIndex {
    /// Let the back-end detect the kz partitions from the samples
    Auto,
}

/// Construction parameters passed to every factory
#[derive(Debug, Clone)]
pub struct OperatorParams<T: Real> {
    pub n_coils: usize,
    /// Sensitivity maps exposed to the back-end ("sense" mode)
    pub smaps: Option<Arc<SensitivityMaps<T>>>,
    /// Requested numerical tolerance
    pub eps: f64,
    /// Grid oversampling factor
    pub upsampfac: f64,
    pub z_index: Option<ZIndex>,
}

impl<T: Real> OperatorParams<T> {
    #[must_use]
    pub fn new(n_coils: usize) -> Self {
        Self {
            n_coils,
            smaps: None,
            eps: 1e-6,
            upsampfac: 2.0,
            z_index: None,
        }
    }
}

/// One instantiated transform
pub trait NufftOperator<T: Real> {
    /// Forward transform, image → k-space `(n_coils, n_samples)`
    /// # Errors
    /// back-end failures or unexpected input shapes
    fn op(&self, image: &ComplexTensor<T>) -> Result<ComplexTensor<T>>;

    /// Adjoint transform, k-space → image
    /// # Errors
    /// back-end failures or unexpected input shapes
    fn adj_op(&self, kspace: &ComplexTensor<T>) -> Result<ComplexTensor<T>>;

    /// Gradient of the data-consistency term, `A^H (A x − y)`
    /// # Errors
    /// back-end failures or unexpected input shapes
    fn data_consistency(
        &self,
        image: &ComplexTensor<T>,
        kspace: &ComplexTensor<T>,
    ) -> Result<ComplexTensor<T>> {
        let mut residual = self.op(image)?;
        if residual.shape() != kspace.shape() {
            return Err(BenchError::Backend(format!(
                "k-space shape {:?} does not match forward output {:?}",
                kspace.shape(),
                residual.shape()
            )));
        }
        for (r, y) in residual.data_mut().iter_mut().zip(kspace.data()) {
            *r = *r - *y;
        }
        self.adj_op(&residual)
    }

    fn n_coils(&self) -> usize;

    fn shape(&self) -> &VolumeShape;

    fn n_samples(&self) -> usize;

    fn uses_sense(&self) -> bool;
}

/// Builds operators of one back-end
pub trait OperatorFactory<T: Real>: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// back-end specific construction failures
    fn create(
        &self,
        trajectory: &Trajectory,
        shape: &VolumeShape,
        params: &OperatorParams<T>,
    ) -> Result<Box<dyn NufftOperator<T>>>;
}

/// Registry of back-ends, looked up by name
pub struct BackendRegistry<T: Real> {
    factories: HashMap<String, Arc<dyn OperatorFactory<T>>>,
}

impl<T: Real> BackendRegistry<T> {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the built-in `noop` and `ndft` back-ends
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoopFactory));
        registry.register(Arc::new(NdftFactory));
        registry
    }

    /// Register a back-end under its own name, replacing any previous one
    pub fn register(&mut self, factory: Arc<dyn OperatorFactory<T>>) {
        self.factories.insert(factory.name().to_string(), factory);
    }

    /// # Errors
    /// `UnknownBackend` if nothing is registered under `name`
    pub fn get_operator(&self, name: &str) -> Result<Arc<dyn OperatorFactory<T>>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| BenchError::UnknownBackend(name.to_string()))
    }

    /// Registered back-end names, sorted
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: Real> Default for BackendRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ===== SHARED GEOMETRY =====

/// Shapes an operator consumes and produces
#[derive(Debug, Clone)]
struct Geometry<T: Real> {
    shape: VolumeShape,
    n_coils: usize,
    n_samples: usize,
    smaps: Option<Arc<SensitivityMaps<T>>>,
}

impl<T: Real> Geometry<T> {
    fn new(
        trajectory: &Trajectory,
        shape: &VolumeShape,
        params: &OperatorParams<T>,
    ) -> Result<Self> {
        if params.n_coils == 0 {
            return Err(BenchError::InvalidParameter("n_coils must be positive".into()));
        }
        if trajectory.dim() != shape.ndim() {
            return Err(BenchError::InvalidParameter(format!(
                "{}D trajectory cannot address a {}D volume",
                trajectory.dim(),
                shape.ndim()
            )));
        }
        if let Some(smaps) = &params.smaps
            && smaps.shape() != shape.with_coils(params.n_coils).as_slice()
        {
            return Err(BenchError::invalid_shape(
                smaps.shape(),
                format!("sensitivity maps must be {:?}", shape.with_coils(params.n_coils)),
            ));
        }
        Ok(Self {
            shape: shape.clone(),
            n_coils: params.n_coils,
            n_samples: trajectory.n_samples(),
            smaps: params.smaps.clone(),
        })
    }

    /// Image-domain shape: one volume with sense or a single coil, else a coil stack
    fn image_shape(&self) -> Vec<usize> {
        if self.smaps.is_some() || self.n_coils == 1 {
            self.shape.dims().to_vec()
        } else {
            self.shape.with_coils(self.n_coils)
        }
    }

    fn kspace_shape(&self) -> Vec<usize> {
        vec![self.n_coils, self.n_samples]
    }

    fn check(&self, what: &str, got: &[usize], expected: &[usize]) -> Result<()> {
        if got == expected {
            Ok(())
        } else {
            Err(BenchError::Backend(format!(
                "{what} has shape {got:?}, expected {expected:?}"
            )))
        }
    }

    fn check_image(&self, image: &ComplexTensor<T>) -> Result<()> {
        self.check("image", image.shape(), &self.image_shape())
    }

    fn check_kspace(&self, kspace: &ComplexTensor<T>) -> Result<()> {
        self.check("k-space", kspace.shape(), &self.kspace_shape())
    }
}

// ===== NOOP BACKEND =====

/// Factory for [`NoopOperator`], registered as `noop`
pub struct NoopFactory;

impl<T: Real> OperatorFactory<T> for NoopFactory {
    fn name(&self) -> &str {
        "noop"
    }

    fn create(
        &self,
        trajectory: &Trajectory,
        shape: &VolumeShape,
        params: &OperatorParams<T>,
    ) -> Result<Box<dyn NufftOperator<T>>> {
        Ok(Box::new(NoopOperator {
            geometry: Geometry::new(trajectory, shape, params)?,
        }))
    }
}

/// Shape-checking operator that returns zeros
pub struct NoopOperator<T: Real> {
    geometry: Geometry<T>,
}

impl<T: Real> NufftOperator<T> for NoopOperator<T> {
    fn op(&self, image: &ComplexTensor<T>) -> Result<ComplexTensor<T>> {
        self.geometry.check_image(image)?;
        Ok(ComplexTensor::zeros(&self.geometry.kspace_shape()))
    }

    fn adj_op(&self, kspace: &ComplexTensor<T>) -> Result<ComplexTensor<T>> {
        self.geometry.check_kspace(kspace)?;
        Ok(ComplexTensor::zeros(&self.geometry.image_shape()))
    }

    fn n_coils(&self) -> usize {
        self.geometry.n_coils
    }

    fn shape(&self) -> &VolumeShape {
        &self.geometry.shape
    }

    fn n_samples(&self) -> usize {
        self.geometry.n_samples
    }

    fn uses_sense(&self) -> bool {
        self.geometry.smaps.is_some()
    }
}

// ===== DIRECT NDFT BACKEND =====

/// Factory for [`NdftOperator`], registered as `ndft`
pub struct NdftFactory;

impl<T: Real> OperatorFactory<T> for NdftFactory {
    fn name(&self) -> &str {
        "ndft"
    }

    fn create(
        &self,
        trajectory: &Trajectory,
        shape: &VolumeShape,
        params: &OperatorParams<T>,
    ) -> Result<Box<dyn NufftOperator<T>>> {
        let geometry = Geometry::new(trajectory, shape, params)?;
        let points = (0..trajectory.n_samples())
            .map(|k| trajectory.point(k))
            .collect();
        Ok(Box::new(NdftOperator { geometry, points }))
    }
}

/// Exact non-uniform DFT, `y_k = Σ_x f(x) exp(−2πi k·x)` over a centred grid
pub struct NdftOperator<T: Real> {
    geometry: Geometry<T>,
    points: Vec<Vec<f64>>,
}

impl<T: Real> NdftOperator<T> {
    /// Centred grid coordinates of every voxel, row-major
    fn grid(&self) -> Vec<Vec<f64>> {
        let dims = self.geometry.shape.dims();
        let numel = self.geometry.shape.numel();
        let mut grid = Vec::with_capacity(numel);
        for flat in 0..numel {
            let mut rem = flat;
            let mut coord = vec![0.0; dims.len()];
            for (d, &n) in dims.iter().enumerate().rev() {
                coord[d] = (rem % n) as f64 - (n / 2) as f64;
                rem /= n;
            }
            grid.push(coord);
        }
        grid
    }

    fn phase(k: &[f64], x: &[f64]) -> f64 {
        -2.0 * PI * k.iter().zip(x).map(|(a, b)| a * b).sum::<f64>()
    }

    fn to_f64(c: &Complex<T>) -> Complex<f64> {
        Complex::new(c.re.as_f64(), c.im.as_f64())
    }

    fn from_f64(c: Complex<f64>) -> Complex<T> {
        Complex::new(T::from_real(c.re), T::from_real(c.im))
    }

    /// Per-coil images, applying the sensitivity maps in sense mode
    fn coil_images(&self, image: &ComplexTensor<T>) -> Vec<Vec<Complex<f64>>> {
        let volume = self.geometry.shape.numel();
        match &self.geometry.smaps {
            Some(smaps) => smaps
                .data()
                .chunks(volume)
                .map(|s| {
                    s.iter()
                        .zip(image.data())
                        .map(|(s, x)| Self::to_f64(s) * Self::to_f64(x))
                        .collect()
                })
                .collect(),
            None => image
                .data()
                .chunks(volume)
                .map(|c| c.iter().map(Self::to_f64).collect())
                .collect(),
        }
    }
}

impl<T: Real> NufftOperator<T> for NdftOperator<T> {
    fn op(&self, image: &ComplexTensor<T>) -> Result<ComplexTensor<T>> {
        self.geometry.check_image(image)?;
        let grid = self.grid();
        let mut out = Vec::with_capacity(self.geometry.n_coils * self.geometry.n_samples);
        for coil in self.coil_images(image) {
            for k in &self.points {
                let acc: Complex<f64> = coil
                    .iter()
                    .zip(&grid)
                    .map(|(f, x)| f * Complex::from_polar(1.0, Self::phase(k, x)))
                    .sum();
                out.push(Self::from_f64(acc));
            }
        }
        ComplexTensor::new(out, &self.geometry.kspace_shape())
    }

    fn adj_op(&self, kspace: &ComplexTensor<T>) -> Result<ComplexTensor<T>> {
        self.geometry.check_kspace(kspace)?;
        let grid = self.grid();
        let volume = grid.len();
        let coils: Vec<Vec<Complex<f64>>> = kspace
            .data()
            .chunks(self.geometry.n_samples)
            .map(|y| {
                grid.iter()
                    .map(|x| {
                        y.iter()
                            .zip(&self.points)
                            .map(|(v, k)| {
                                Self::to_f64(v) * Complex::from_polar(1.0, -Self::phase(k, x))
                            })
                            .sum::<Complex<f64>>()
                    })
                    .collect()
            })
            .collect();

        let data: Vec<Complex<T>> = match &self.geometry.smaps {
            Some(smaps) => {
                let mut combined = vec![Complex::new(0.0, 0.0); volume];
                for (coil, s) in coils.iter().zip(smaps.data().chunks(volume)) {
                    for ((acc, v), s) in combined.iter_mut().zip(coil).zip(s) {
                        *acc += Self::to_f64(s).conj() * v;
                    }
                }
                combined.into_iter().map(Self::from_f64).collect()
            }
            None => coils.into_iter().flatten().map(Self::from_f64).collect(),
        };
        ComplexTensor::new(data, &self.geometry.image_shape())
    }

    fn n_coils(&self) -> usize {
        self.geometry.n_coils
    }

    fn shape(&self) -> &VolumeShape {
        &self.geometry.shape
    }

    fn n_samples(&self) -> usize {
        self.geometry.n_samples
    }

    fn uses_sense(&self) -> bool {
        self.geometry.smaps.is_some()
    }
}
