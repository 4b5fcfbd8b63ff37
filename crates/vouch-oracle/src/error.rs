//! # Oracle Client Errors
//!
//! The submission path fails in exactly five ways that matter to callers:
//! the oracle is down, the oracle said no, the nullifier is spent, the
//! transaction was rejected, or the oracle's answer could not be decoded.
//! Only the first and a stale blockhash are worth retrying.

use thiserror::Error;
use vouch_attestation::{AddressError, RecordIxError};
use vouch_core::ValidationError;
use vouch_ledger::{LedgerError, TransactionFailure};

/// Error raised while verifying a proof or recording its attestation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Transport failure, timeout, 5xx or unhealthy status.
    #[error("verification oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The oracle checked the proof and refused it.
    #[error("verification rejected: {0}")]
    VerificationRejected(String),

    /// The nullifier record already exists on the ledger.
    #[error("nullifier {nullifier} already used")]
    NullifierAlreadyUsed {
        /// 8-hex-char nullifier prefix.
        nullifier: String,
    },

    /// The ledger rejected or failed to confirm the transaction.
    #[error(transparent)]
    TransactionFailed(LedgerError),

    /// The oracle's attestation could not be normalized or does not match
    /// the submitted proof.
    #[error("attestation decode failed: {0}")]
    SignatureDecodeError(String),

    /// The envelope failed local checks before any network call.
    #[error("invalid envelope: {0}")]
    Validation(#[from] ValidationError),

    /// Record address derivation failed.
    #[error("address derivation failed: {0}")]
    Address(#[from] AddressError),

    /// Missing or malformed client configuration.
    #[error("oracle client misconfigured: {0}")]
    Config(String),

    /// Every retry attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error from the final attempt.
        last: Box<OracleError>,
    },

    /// The caller cancelled the operation.
    #[error("oracle operation cancelled")]
    Cancelled,
}

impl OracleError {
    /// Whether repeating the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OracleUnavailable(_) => true,
            Self::TransactionFailed(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// True for an unreachable oracle, including after retries ran out.
    /// This is the only condition that may trigger the format-only path.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::OracleUnavailable(_) => true,
            Self::RetriesExhausted { last, .. } => last.is_unavailable(),
            _ => false,
        }
    }
}

impl From<LedgerError> for OracleError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Cancelled => Self::Cancelled,
            other => Self::TransactionFailed(other),
        }
    }
}

impl From<TransactionFailure> for OracleError {
    fn from(e: TransactionFailure) -> Self {
        Self::TransactionFailed(LedgerError::TransactionFailed(e))
    }
}

impl From<RecordIxError> for OracleError {
    fn from(e: RecordIxError) -> Self {
        match e {
            RecordIxError::Encoding(v) => Self::SignatureDecodeError(v.to_string()),
            RecordIxError::Address(a) => Self::Address(a),
        }
    }
}
