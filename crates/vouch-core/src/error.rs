//! # Validation Errors
//!
//! Input-shape failures shared by the envelope layer and the attestation
//! codec. Every variant is terminal: the caller has to regenerate the proof
//! or fix the input, retrying the same bytes can never succeed.

use thiserror::Error;

/// Malformed, oversized or expired protocol input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A size-capped component exceeded its limit.
    #[error("{component} too large: {size} bytes exceeds the {max}-byte limit")]
    ProofTooLarge {
        /// Which component overflowed ("proof" or "public inputs").
        component: &'static str,
        /// Observed size in bytes.
        size: usize,
        /// Maximum permitted size in bytes.
        max: usize,
    },

    /// A field is not in the expected textual format.
    #[error("invalid format for {field}: {reason}")]
    InvalidFormat {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The envelope's expiry has passed.
    #[error("proof expired at {expires_at_ms} (now {now_ms})")]
    ProofExpired {
        /// Envelope expiry, unix milliseconds.
        expires_at_ms: u64,
        /// Observed time, unix milliseconds.
        now_ms: u64,
    },

    /// A fixed-width binary field has the wrong length or value.
    #[error("malformed field {field}: {reason}")]
    MalformedField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A fixed-length message has the wrong length.
    #[error("truncated message: expected {expected} bytes, got {actual}")]
    TruncatedMessage {
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// The proof carries a different number of public inputs than the
    /// circuit declares.
    #[error("unexpected public input count: expected {expected}, got {actual}")]
    PublicInputCount {
        /// Count declared by the circuit.
        expected: usize,
        /// Count carried by the proof.
        actual: usize,
    },
}

impl ValidationError {
    /// Shorthand for a `MalformedField` wrong-length error.
    pub fn wrong_length(field: &'static str, expected: usize, actual: usize) -> Self {
        Self::MalformedField {
            field,
            reason: format!("expected {expected} bytes, got {actual}"),
        }
    }
}
