use thiserror::Error;

/// Main error type for the ProcessOptimizer system
#[derive(Error, Debug)]
pub enum PoError {
    #[error("Invalid point: {0}")]
    InvalidPoint(#[from] InvalidPointError),

    #[error("Surrogate error: {0}")]
    Surrogate(#[from] SurrogateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl PoError {
    /// True for the underdetermined-fit case, which the warm-up phase
    /// normally prevents.
    pub fn is_underdetermined(&self) -> bool {
        matches!(self, PoError::Surrogate(SurrogateError::Underdetermined { .. }))
    }
}

/// A point handed to the optimizer does not belong to its space.
///
/// Always surfaced to the caller; points are never silently clamped on `tell`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidPointError {
    #[error("expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("dimension '{dimension}' expects a {expected} value, got {actual}")]
    WrongKind {
        dimension: String,
        expected: String,
        actual: String,
    },

    #[error("dimension '{dimension}': value {value} outside [{low}, {high}]")]
    OutOfBounds {
        dimension: String,
        value: f64,
        low: f64,
        high: f64,
    },

    #[error("dimension '{dimension}': unknown category {value}")]
    UnknownCategory { dimension: String, value: String },

    #[error("dimension '{dimension}': value is not finite")]
    NonFinite { dimension: String },

    #[error("encoded vector has {actual} components, space expects {expected}")]
    EncodedLength { expected: usize, actual: usize },
}

/// Surrogate model fitting and prediction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurrogateError {
    #[error("underdetermined fit: {distinct} distinct points supplied, at least {required} required")]
    Underdetermined { distinct: usize, required: usize },

    #[error("surrogate fit failed on {n_points} points in {n_dims} dimensions: {reason}")]
    FitFailed {
        n_points: usize,
        n_dims: usize,
        reason: String,
    },

    #[error("surrogate has not been fitted")]
    NotFitted,

    #[error("query has {actual} dimensions, model was fitted on {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type alias for ProcessOptimizer operations
pub type PoResult<T> = Result<T, PoError>;

/// Result alias for surrogate operations
pub type SurrogateResult<T> = Result<T, SurrogateError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PoError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::PoError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PoError::Config(format!($($arg)*))
    };
}
