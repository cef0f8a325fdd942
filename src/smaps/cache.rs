//! On-disk cache for simulated sensitivity maps
//!
//! Maps are keyed by `(n_coils, volume shape)`. There is no invalidation: a
//! stale cache has to be removed by hand or through [`SmapsCache::clear`].
//! Concurrent first-time fills of the same key are a benign race since every
//! write replaces the whole file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dtype::Real;
use crate::error::{BenchError, Result};
use crate::io::{load_tensor, save_tensor};
use crate::shape::VolumeShape;
use crate::tensor::ComplexTensor;

/// Environment variable overriding the default cache directory
pub const CACHE_DIR_ENV: &str = "NUFFT_BENCH_SMAPS_CACHE";

const FILE_PREFIX: &str = "smaps_";
const FILE_EXTENSION: &str = "bin";

/// Directory-backed sensitivity map cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmapsCache {
    dir: PathBuf,
}

impl SmapsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$NUFFT_BENCH_SMAPS_CACHE` if set, otherwise `<tmp>/smaps`
    #[must_use]
    pub fn from_env() -> Self {
        let dir = std::env::var(CACHE_DIR_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("smaps"));
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the maps for `(n_coils, shape)`
    #[must_use]
    pub fn path_for(&self, n_coils: usize, shape: &VolumeShape) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{n_coils}_{shape}.{FILE_EXTENSION}"))
    }

    #[must_use]
    pub fn contains(&self, n_coils: usize, shape: &VolumeShape) -> bool {
        self.path_for(n_coils, shape).is_file()
    }

    /// Return cached maps, or run `compute` and persist its result
    ///
    /// `compute` is only invoked on a cache miss.
    /// # Errors
    /// I/O and decoding errors, a cached file whose shape disagrees with the
    /// key, or whatever `compute` returns
    pub fn load_or_compute<T, F>(
        &self,
        n_coils: usize,
        shape: &VolumeShape,
        compute: F,
    ) -> Result<ComplexTensor<T>>
    where
        T: Real,
        F: FnOnce() -> Result<ComplexTensor<T>>,
    {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(n_coils, shape);
        let expected = shape.with_coils(n_coils);

        match load_tensor::<T, _>(&path) {
            Ok(maps) => {
                if maps.shape() != expected.as_slice() {
                    return Err(BenchError::Cache(format!(
                        "{} holds shape {:?}, expected {:?}",
                        path.display(),
                        maps.shape(),
                        expected
                    )));
                }
                debug!(path = %path.display(), "sensitivity maps cache hit");
                Ok(maps)
            }
            Err(BenchError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "sensitivity maps cache miss, simulating");
                let maps = compute()?;
                save_tensor(&maps, &path)?;
                Ok(maps)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove every cached map file, returning how many were deleted
    /// # Errors
    /// directory listing and removal errors; a missing directory counts as empty
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_map = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX))
                && path.extension().is_some_and(|e| e == FILE_EXTENSION);
            if is_map && path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for SmapsCache {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn shape() -> VolumeShape {
        VolumeShape::new(&[4, 6]).unwrap()
    }

    #[test]
    fn test_path_layout() {
        let cache = SmapsCache::new("/cache");
        let s = VolumeShape::new(&[64, 64, 64]).unwrap();
        assert_eq!(
            cache.path_for(4, &s),
            PathBuf::from("/cache/smaps_4_(64, 64, 64).bin")
        );
    }

    #[test]
    fn test_second_call_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SmapsCache::new(dir.path().join("nested"));
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(ComplexTensor::<f32>::rand(&[2, 4, 6]))
        };

        let first = cache.load_or_compute(2, &shape(), compute).unwrap();
        assert!(cache.contains(2, &shape()));
        let second = cache.load_or_compute(2, &shape(), compute).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SmapsCache::new(dir.path());
        save_tensor(&ComplexTensor::<f32>::zeros(&[3, 4, 6]), cache.path_for(2, &shape()))
            .unwrap();
        let err = cache
            .load_or_compute(2, &shape(), || Ok(ComplexTensor::<f32>::zeros(&[2, 4, 6])))
            .unwrap_err();
        assert!(matches!(err, BenchError::Cache(_)));
    }

    #[test]
    fn test_compute_error_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SmapsCache::new(dir.path());
        let result = cache.load_or_compute::<f64, _>(2, &shape(), || {
            Err(BenchError::InvalidParameter("nope".into()))
        });
        assert!(result.is_err());
        assert!(!cache.contains(2, &shape()));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SmapsCache::new(dir.path());
        assert_eq!(cache.clear().unwrap(), 0);
        for n in [2, 3] {
            cache
                .load_or_compute(n, &shape(), || Ok(ComplexTensor::<f32>::zeros(&[n, 4, 6])))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());

        let missing = SmapsCache::new(dir.path().join("never-created"));
        assert_eq!(missing.clear().unwrap(), 0);
    }
}
