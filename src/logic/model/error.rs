//! Detection errors
//!
//! One variant per failure class. `InvalidInput` is the caller's fault and
//! recoverable; everything else points at the artifact or the runtime.

use thiserror::Error;

pub type DetectionResult<T> = Result<T, DetectionError>;

#[derive(Debug, Error)]
pub enum DetectionError {
    /// Wrong arity, non-finite values or a missing field.
    #[error("invalid input (expected {expected} features): {detail}")]
    InvalidInput { expected: usize, detail: String },

    /// Artifact missing, corrupt or incompatible. Fatal at start-up.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// The scoring runtime failed mid-call.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The model produced something the decision policy does not recognize.
    #[error("model contract violation: {0}")]
    ContractViolation(String),
}

impl DetectionError {
    pub fn invalid_input(expected: usize, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            expected,
            detail: detail.into(),
        }
    }
}
