//! Error types for the optimizer core.
//!
//! The catalog, config files and CLI wrap these in `anyhow::Error` with
//! context; the core itself only ever returns [`OptimizerError`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// The candidate pool was empty.
    #[error("Insufficient candidates: the candidate pool is empty")]
    InsufficientCandidates,

    #[error("Dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A target vibe was requested from zero seed vectors.
    #[error("No seed vectors were supplied for the target vibe")]
    NoSeeds,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
