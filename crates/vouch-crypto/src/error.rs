//! Errors raised by key parsing and signature checks.

use thiserror::Error;

/// Key handling or signature verification failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing or construction failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// A fixed-width byte value had the wrong length or encoding.
    #[error("invalid encoding for {field}: {reason}")]
    Encoding {
        /// Which value was being decoded.
        field: &'static str,
        /// What went wrong.
        reason: String,
    },
}
