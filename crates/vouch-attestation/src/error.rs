//! Address parsing and program-derived address errors.

use thiserror::Error;

/// Failure to parse or derive a ledger address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The string is not valid base58.
    #[error("invalid base58 address: {0}")]
    InvalidBase58(String),

    /// Decoded bytes are not 32 long.
    #[error("address must be 32 bytes, got {0}")]
    WrongLength(usize),

    /// More seeds than the ledger accepts.
    #[error("too many seeds: {count} exceeds the limit of {max}")]
    TooManySeeds {
        /// Seeds supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A single seed longer than the ledger accepts.
    #[error("seed {index} is {len} bytes, limit is {max}")]
    SeedTooLong {
        /// Position of the offending seed.
        index: usize,
        /// Its length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// The derived point lies on the Ed25519 curve, so it could have a
    /// private key and is not a valid program address.
    #[error("derived address is on the curve")]
    OnCurve,

    /// No bump seed in 0..=255 produced an off-curve address.
    #[error("no viable bump seed found")]
    NoViableBump,
}
