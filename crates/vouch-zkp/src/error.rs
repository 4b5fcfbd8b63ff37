//! Errors raised by the prover interface, circuit loader and proof cache.

use thiserror::Error;

/// Failure of the external proving engine.
///
/// `Clone` because one in-flight circuit load is shared between every
/// caller awaiting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    /// The proving engine or circuit artifact could not be loaded.
    #[error("circuit {circuit_id} unavailable: {reason}")]
    CircuitUnavailable {
        /// Circuit that failed to load.
        circuit_id: String,
        /// Underlying cause.
        reason: String,
    },

    /// The witness does not satisfy the circuit.
    #[error("constraints not satisfied: {0}")]
    Unsatisfiable(String),

    /// Internal prover failure.
    #[error("prover error: {0}")]
    Internal(String),
}

impl ProverError {
    /// Loading failures may clear up on a later attempt; constraint and
    /// internal failures will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CircuitUnavailable { .. })
    }
}

/// Failure reading or writing the persisted proof cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem error.
    #[error("proof cache I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The cache file could not be encoded.
    #[error("proof cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
