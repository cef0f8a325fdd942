use crate::dtype::Real;
use crate::error::{BenchError, Result};
use num_complex::Complex;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

// ===== COMPLEX TENSOR STRUCTURE =====

/// Dense complex array used for phantoms, k-space samples and sensitivity maps
///
/// Fields:
/// - `data`: flat row-major `Vec<Complex<T>>`
/// - `shape`: dimensions, e.g. `[coils, z, y, x]`
#[derive(Clone, PartialEq)]
pub struct ComplexTensor<T: Real> {
    data: Vec<Complex<T>>,
    shape: Vec<usize>,
}

impl<T: Real> std::fmt::Debug for ComplexTensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexTensor")
            .field("shape", &self.shape)
            .field("dtype", &T::PRECISION)
            .finish()
    }
}

// ===== CONSTRUCTORS =====
impl<T: Real> ComplexTensor<T> {
    /// Create a tensor from flat data and a shape
    /// # Errors
    /// `InvalidShape` if `data.len()` differs from the shape's element count
    pub fn new(data: Vec<Complex<T>>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(BenchError::invalid_shape(
                shape,
                format!("shape holds {expected} elements but data has {}", data.len()),
            ));
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Create a tensor filled with zeros
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let size = shape.iter().product();
        Self {
            data: vec![Complex::new(T::zero(), T::zero()); size],
            shape: shape.to_vec(),
        }
    }

    /// Real and imaginary parts drawn independently from U[0, 1)
    #[must_use]
    pub fn rand(shape: &[usize]) -> Self {
        let size = shape.iter().product();
        let mut rng = rand::rng();
        let data = (0..size)
            .map(|_| {
                Complex::new(
                    T::from_real(rng.random::<f64>()),
                    T::from_real(rng.random::<f64>()),
                )
            })
            .collect();
        Self {
            data,
            shape: shape.to_vec(),
        }
    }

    /// Real and imaginary parts drawn independently from N(0, 1)
    #[must_use]
    pub fn randn(shape: &[usize]) -> Self {
        let size = shape.iter().product();
        let mut rng = rand::rng();
        let data = (0..size)
            .map(|_| {
                let re: f64 = StandardNormal.sample(&mut rng);
                let im: f64 = StandardNormal.sample(&mut rng);
                Complex::new(T::from_real(re), T::from_real(im))
            })
            .collect();
        Self {
            data,
            shape: shape.to_vec(),
        }
    }
}

// ===== ACCESSORS =====
impl<T: Real> ComplexTensor<T> {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn data(&self) -> &[Complex<T>] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Complex<T>] {
        &mut self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_data(self) -> Vec<Complex<T>> {
        self.data
    }

    /// Reinterpret with a new shape holding the same number of elements
    /// # Errors
    /// `InvalidShape` if the element counts differ
    pub fn reshape(self, shape: &[usize]) -> Result<Self> {
        Self::new(self.data, shape)
    }

    /// Convert every element to another precision
    #[must_use]
    pub fn cast<U: Real>(&self) -> ComplexTensor<U> {
        ComplexTensor {
            data: self
                .data
                .iter()
                .map(|c| Complex::new(U::from_real(c.re.as_f64()), U::from_real(c.im.as_f64())))
                .collect(),
            shape: self.shape.clone(),
        }
    }
}

// ===== COIL-AXIS OPERATIONS =====
impl<T: Real> ComplexTensor<T> {
    /// Multiply a single volume by every coil of a `(coils, *volume)` stack
    ///
    /// `self` must have the trailing shape of `coils`; the result has the shape
    /// of `coils`.
    /// # Errors
    /// `InvalidShape` when the trailing shapes differ
    pub fn broadcast_mul(&self, coils: &ComplexTensor<T>) -> Result<Self> {
        if coils.shape.len() != self.shape.len() + 1 || coils.shape[1..] != self.shape[..] {
            return Err(BenchError::invalid_shape(
                &coils.shape,
                format!("cannot broadcast volume {:?} against it", self.shape),
            ));
        }
        let volume = self.data.len();
        let data = coils
            .data
            .iter()
            .enumerate()
            .map(|(i, s)| self.data[i % volume] * s)
            .collect();
        Ok(Self {
            data,
            shape: coils.shape.clone(),
        })
    }

    /// Root-sum-of-squares of magnitudes across the leading axis, in `f64`
    #[must_use]
    pub fn rss_first_axis(&self) -> Vec<f64> {
        let Some(&leading) = self.shape.first() else {
            return Vec::new();
        };
        if leading == 0 {
            return Vec::new();
        }
        let volume = self.data.len() / leading;
        let mut acc = vec![0.0_f64; volume];
        for chunk in self.data.chunks(volume) {
            for (a, c) in acc.iter_mut().zip(chunk) {
                *a += c.re.as_f64().powi(2) + c.im.as_f64().powi(2);
            }
        }
        acc.iter_mut().for_each(|a| *a = a.sqrt());
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        let data = vec![Complex::new(1.0_f32, 0.0); 6];
        assert!(ComplexTensor::new(data.clone(), &[2, 3]).is_ok());
        assert!(ComplexTensor::new(data, &[4, 2]).is_err());
    }

    #[test]
    fn test_rand_range() {
        let t = ComplexTensor::<f32>::rand(&[8, 8]);
        assert_eq!(t.len(), 64);
        assert!(t.data().iter().all(|c| (0.0..1.0).contains(&c.re)));
        assert!(t.data().iter().all(|c| (0.0..1.0).contains(&c.im)));
    }

    #[test]
    fn test_randn_is_roughly_standard() {
        let t = ComplexTensor::<f64>::randn(&[4096]);
        let mean: f64 = t.data().iter().map(|c| c.re).sum::<f64>() / 4096.0;
        let var: f64 = t.data().iter().map(|c| (c.re - mean).powi(2)).sum::<f64>() / 4096.0;
        assert!(mean.abs() < 0.1, "mean = {mean}");
        assert!((var - 1.0).abs() < 0.15, "var = {var}");
    }

    #[test]
    fn test_broadcast_mul() {
        let image = ComplexTensor::new(vec![Complex::new(2.0_f64, 0.0); 4], &[2, 2]).unwrap();
        let mut coils = ComplexTensor::<f64>::zeros(&[3, 2, 2]);
        for (i, c) in coils.data_mut().iter_mut().enumerate() {
            *c = Complex::new(0.0, i as f64);
        }
        let out = image.broadcast_mul(&coils).unwrap();
        assert_eq!(out.shape(), &[3, 2, 2]);
        assert_eq!(out.data()[5], Complex::new(0.0, 10.0));

        let wrong = ComplexTensor::<f64>::zeros(&[3, 4]);
        assert!(image.broadcast_mul(&wrong).is_err());
    }

    #[test]
    fn test_rss_first_axis() {
        let data = vec![
            Complex::new(3.0_f32, 0.0),
            Complex::new(0.0, 1.0),
            Complex::new(0.0, 4.0),
            Complex::new(0.0, 0.0),
        ];
        let t = ComplexTensor::new(data, &[2, 2]).unwrap();
        assert_eq!(t.rss_first_axis(), vec![5.0, 1.0]);
    }

    #[test]
    fn test_cast_preserves_shape() {
        let t = ComplexTensor::<f64>::rand(&[2, 3]);
        let single: ComplexTensor<f32> = t.cast();
        assert_eq!(single.shape(), &[2, 3]);
        assert!((single.data()[1].re.as_f64() - t.data()[1].re).abs() < 1e-6);
    }
}
