use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::tensor::ComplexTensor;
use bincode::{Decode, Encode, config};
use num_complex::Complex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

// Serializable representation of complex tensor data. Components are widened to
// f64 so a file written from either precision decodes bit-identically.
#[derive(Encode, Decode, Clone, Debug, PartialEq)]
pub struct TensorData {
    pub shape: Vec<usize>,
    pub re: Vec<f64>,
    pub im: Vec<f64>,
}

impl TensorData {
    pub fn from_tensor<T: Real>(t: &ComplexTensor<T>) -> Self {
        let (re, im) = t
            .data()
            .iter()
            .map(|c| (c.re.as_f64(), c.im.as_f64()))
            .unzip();
        TensorData {
            shape: t.shape().to_vec(),
            re,
            im,
        }
    }

    /// Rebuild a tensor in the requested precision
    /// # Errors
    /// `Cache` if the component vectors disagree with the shape
    pub fn to_tensor<T: Real>(&self) -> Result<ComplexTensor<T>> {
        if self.re.len() != self.im.len() {
            return Err(BenchError::Cache(format!(
                "real/imaginary length mismatch: {} vs {}",
                self.re.len(),
                self.im.len()
            )));
        }
        let data = self
            .re
            .iter()
            .zip(&self.im)
            .map(|(&re, &im)| Complex::new(T::from_real(re), T::from_real(im)))
            .collect();
        ComplexTensor::new(data, &self.shape).map_err(|e| BenchError::Cache(e.to_string()))
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling scratch path, unique per process and call
fn tmp_path(path: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{n}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Encode any bincode value to a file, replacing previous content
///
/// The bytes go to a sibling temp file that is then renamed over `path`, so
/// concurrent readers see either the old or the new content, never a prefix.
/// # Errors
/// file creation and encoding errors
pub fn save_encoded<E: Encode, P: AsRef<Path>>(value: &E, path: P) -> Result<()> {
    let path = path.as_ref();
    let encoded = bincode::encode_to_vec(value, config::standard())
        .map_err(|e| BenchError::Cache(e.to_string()))?;
    let tmp = tmp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(&encoded)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Decode a bincode value from a file
/// # Errors
/// file opening and decoding errors
pub fn load_encoded<D: Decode<()>, P: AsRef<Path>>(path: P) -> Result<D> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    let (value, _): (D, _) = bincode::decode_from_slice(&buffer, config::standard())
        .map_err(|e| BenchError::Cache(e.to_string()))?;
    Ok(value)
}

/// Persist a complex tensor (phantoms, sensitivity maps)
/// # Errors
/// file creation and encoding errors
pub fn save_tensor<T: Real, P: AsRef<Path>>(t: &ComplexTensor<T>, path: P) -> Result<()> {
    save_encoded(&TensorData::from_tensor(t), path)
}

/// Load a complex tensor written by [`save_tensor`]
/// # Errors
/// file opening and decoding errors
pub fn load_tensor<T: Real, P: AsRef<Path>>(path: P) -> Result<ComplexTensor<T>> {
    load_encoded::<TensorData, _>(path)?.to_tensor()
}
