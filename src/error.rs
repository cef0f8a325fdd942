use crate::dtype::Precision;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Unknown task {0:?}, expected one of \"forward\", \"adjoint\", \"grad\"")]
    UnknownTask(String),

    #[error("Unsupported antenna {0:?}, only \"birdcage\" is available")]
    UnsupportedAntenna(String),

    #[error("Invalid shape {shape:?}: {reason}")]
    InvalidShape { shape: Vec<usize>, reason: String },

    #[error("Unknown backend {0:?}")]
    UnknownBackend(String),

    #[error("Unknown trajectory {0:?}")]
    UnknownTrajectory(String),

    #[error("Precision mismatch: configuration asks for {expected}, data is {actual}")]
    PrecisionMismatch { expected: Precision, actual: Precision },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BenchError {
    pub(crate) fn invalid_shape(shape: &[usize], reason: impl Into<String>) -> Self {
        BenchError::InvalidShape {
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }

    /// True for the errors that stem from a bad run configuration rather than
    /// from I/O or a back-end failing at runtime.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BenchError::UnknownTask(_)
                | BenchError::UnsupportedAntenna(_)
                | BenchError::InvalidShape { .. }
                | BenchError::UnknownBackend(_)
                | BenchError::UnknownTrajectory(_)
                | BenchError::PrecisionMismatch { .. }
                | BenchError::InvalidParameter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_descriptive() {
        let err = BenchError::UnknownTask("backward".into());
        assert!(err.to_string().contains("backward"));
        assert!(err.to_string().contains("adjoint"));

        let err = BenchError::invalid_shape(&[4, 2], "rank 2");
        assert_eq!(err.to_string(), "Invalid shape [4, 2]: rank 2");
    }

    #[test]
    fn test_configuration_classification() {
        assert!(BenchError::UnknownTask("x".into()).is_configuration());
        assert!(BenchError::UnsupportedAntenna("loop".into()).is_configuration());
        assert!(!BenchError::Backend("boom".into()).is_configuration());
        let io = std::io::Error::other("disk");
        assert!(!BenchError::from(io).is_configuration());
    }
}
