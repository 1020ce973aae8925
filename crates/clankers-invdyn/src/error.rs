use thiserror::Error;

use crate::hqp::SolverStatus;

/// Errors raised by the formulation: registry mutation, assembly and decoding.
///
/// Registry mutations that fail leave the formulation untouched, so every
/// variant is safe to recover from by simply skipping the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulationError {
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Unknown name: {0}")]
    UnknownName(String),

    #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("Solve failure: optimizer reported {0:?}")]
    SolveFailure(SolverStatus),

    #[error("Invalid weight for {name}: {weight} (must be finite and >= 0)")]
    InvalidWeight { name: String, weight: f64 },

    #[error("Invalid transition duration: {0} (must be finite and >= 0)")]
    InvalidDuration(f64),

    #[error("Invalid force bounds for {name}: min={min}, max={max}")]
    InvalidForceBounds { name: String, min: f64, max: f64 },

    #[error("Invalid friction coefficient for {name}: {mu} (must be finite and >= 0)")]
    InvalidFriction { name: String, mu: f64 },

    #[error("Frame not provided by the state snapshot: {0}")]
    MissingFrame(String),

    #[error("Transition already pending for {0}")]
    TransitionPending(String),

    #[error("No problem data has been assembled yet")]
    NotAssembled,

    #[error("No solution has been decoded yet")]
    NotDecoded,
}

impl FormulationError {
    pub(crate) fn dimension(context: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            got,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
