use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown verdict label: {0}")]
    UnknownLabel(String),

    #[error("label {0} is reserved for the genesis block")]
    ReservedLabel(String),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(String),
}
