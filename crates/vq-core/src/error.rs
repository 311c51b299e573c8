//! Error types for VariQ

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VqError {
    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Invalid filter type: {tag}")]
    InvalidFilterType { tag: String },

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Biquad has no exact state-variable representation")]
    ApproximateConversion,
}

/// Result type alias
pub type VqResult<T> = Result<T, VqError>;
