//! # Ledger Errors
//!
//! Three layers, outermost first:
//!
//! - [`LedgerError`]: anything a [`crate::LedgerClient`] call can return.
//! - [`TransactionFailure`]: the chain accepted the request but rejected
//!   the transaction. Only a stale blockhash is worth retrying, and only
//!   after rebuilding with a fresh one.
//! - [`ProgramError`]: a rejection raised by the Vouch program itself,
//!   numbered as the deployed program numbers its custom errors.

use thiserror::Error;
use vouch_attestation::Address;

/// Custom error base of the Vouch program.
pub const PROGRAM_ERROR_BASE: u32 = 6000;

/// Account-not-initialized error code raised by the program framework.
pub const ACCOUNT_NOT_INITIALIZED_CODE: u32 = 3012;

/// Seeds constraint violation code raised by the program framework.
pub const CONSTRAINT_SEEDS_CODE: u32 = 2006;

/// Rejection raised by the Vouch ledger program.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramError {
    /// Proof rejected by the legacy direct-verification path.
    #[error("invalid proof")]
    InvalidProof,
    /// Public inputs rejected by the legacy direct-verification path.
    #[error("invalid public inputs")]
    InvalidPublicInputs,
    /// Unknown proof-type tag.
    #[error("invalid proof type")]
    InvalidProofType,
    /// The nullifier record is already marked used.
    #[error("nullifier has already been used")]
    NullifierAlreadyUsed,
    /// Signer is not the admin.
    #[error("unauthorized")]
    Unauthorized,
    /// Verifier record missing or deactivated.
    #[error("verifier not authorized")]
    VerifierNotAuthorized,
    /// Preceding Ed25519 instruction missing, mismatched, or invalid.
    #[error("invalid signature")]
    InvalidSignature,
    /// Protocol is paused.
    #[error("protocol is paused")]
    ProtocolPaused,
    /// Unpause requested while not paused.
    #[error("protocol is not paused")]
    NotPaused,
    /// Pause requested while already paused.
    #[error("protocol is already paused")]
    AlreadyPaused,
    /// Submission before the cooldown elapsed.
    #[error("rate limit cooldown not elapsed")]
    RateLimitCooldown,
    /// Daily submission cap reached.
    #[error("daily rate limit exceeded")]
    DailyRateLimitExceeded,
    /// Rate-limit update with a zero cap or negative cooldown.
    #[error("invalid rate limit configuration")]
    InvalidRateLimit,
    /// Counter overflow.
    #[error("arithmetic overflow")]
    Overflow,
    /// A required record does not exist.
    #[error("account not initialized")]
    AccountNotInitialized,
    /// An account does not match its derived address.
    #[error("seeds constraint violated")]
    ConstraintSeeds,
}

impl ProgramError {
    /// On-chain error code.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidProof => PROGRAM_ERROR_BASE,
            Self::InvalidPublicInputs => PROGRAM_ERROR_BASE + 1,
            Self::InvalidProofType => PROGRAM_ERROR_BASE + 2,
            Self::NullifierAlreadyUsed => PROGRAM_ERROR_BASE + 3,
            Self::Unauthorized => PROGRAM_ERROR_BASE + 6,
            Self::VerifierNotAuthorized => PROGRAM_ERROR_BASE + 7,
            Self::InvalidSignature => PROGRAM_ERROR_BASE + 8,
            Self::ProtocolPaused => PROGRAM_ERROR_BASE + 9,
            Self::NotPaused => PROGRAM_ERROR_BASE + 10,
            Self::AlreadyPaused => PROGRAM_ERROR_BASE + 11,
            Self::RateLimitCooldown => PROGRAM_ERROR_BASE + 12,
            Self::DailyRateLimitExceeded => PROGRAM_ERROR_BASE + 13,
            Self::InvalidRateLimit => PROGRAM_ERROR_BASE + 14,
            Self::Overflow => PROGRAM_ERROR_BASE + 15,
            Self::AccountNotInitialized => ACCOUNT_NOT_INITIALIZED_CODE,
            Self::ConstraintSeeds => CONSTRAINT_SEEDS_CODE,
        }
    }

    /// Inverse of [`ProgramError::code`]. Codes 6004 and 6005 belong to the
    /// retired commitment-account path and map to `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        const ALL: [ProgramError; 16] = [
            ProgramError::InvalidProof,
            ProgramError::InvalidPublicInputs,
            ProgramError::InvalidProofType,
            ProgramError::NullifierAlreadyUsed,
            ProgramError::Unauthorized,
            ProgramError::VerifierNotAuthorized,
            ProgramError::InvalidSignature,
            ProgramError::ProtocolPaused,
            ProgramError::NotPaused,
            ProgramError::AlreadyPaused,
            ProgramError::RateLimitCooldown,
            ProgramError::DailyRateLimitExceeded,
            ProgramError::InvalidRateLimit,
            ProgramError::Overflow,
            ProgramError::AccountNotInitialized,
            ProgramError::ConstraintSeeds,
        ];
        ALL.into_iter().find(|e| e.code() == code)
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidProof => "invalid_proof",
            Self::InvalidPublicInputs => "invalid_public_inputs",
            Self::InvalidProofType => "invalid_proof_type",
            Self::NullifierAlreadyUsed => "nullifier_already_used",
            Self::Unauthorized => "unauthorized",
            Self::VerifierNotAuthorized => "verifier_not_authorized",
            Self::InvalidSignature => "invalid_signature",
            Self::ProtocolPaused => "protocol_paused",
            Self::NotPaused => "not_paused",
            Self::AlreadyPaused => "already_paused",
            Self::RateLimitCooldown => "rate_limit_cooldown",
            Self::DailyRateLimitExceeded => "daily_rate_limit_exceeded",
            Self::InvalidRateLimit => "invalid_rate_limit",
            Self::Overflow => "overflow",
            Self::AccountNotInitialized => "account_not_initialized",
            Self::ConstraintSeeds => "constraint_seeds",
        }
    }
}

/// The chain rejected a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionFailure {
    /// The recent blockhash expired or was never issued.
    #[error("blockhash not found")]
    BlockhashNotFound,

    /// The fee payer cannot cover fees and rent.
    #[error("insufficient funds: needed {needed} lamports, available {available}")]
    InsufficientFunds {
        /// Lamports required.
        needed: u64,
        /// Lamports held.
        available: u64,
    },

    /// A required signature is missing or does not verify.
    #[error("signature verification failed for {signer}")]
    SignatureFailure {
        /// Account whose signature failed.
        signer: Address,
    },

    /// Account creation hit an existing account.
    #[error("account {address} already in use")]
    AccountAlreadyInUse {
        /// Account that already exists.
        address: Address,
    },

    /// Instruction data or accounts could not be parsed.
    #[error("instruction {index} is invalid: {reason}")]
    InvalidInstruction {
        /// Position of the instruction in the transaction.
        index: usize,
        /// Parse failure.
        reason: String,
    },

    /// Instruction targets a program the ledger does not run.
    #[error("instruction {index} targets unsupported program {program_id}")]
    UnsupportedProgram {
        /// Position of the instruction in the transaction.
        index: usize,
        /// Unknown program.
        program_id: Address,
    },

    /// A program returned an error.
    #[error("instruction {index} failed: custom program error {code:#x} ({error})", code = .error.code())]
    Program {
        /// Position of the failing instruction.
        index: usize,
        /// Program error.
        error: ProgramError,
    },
}

impl TransactionFailure {
    /// Only a stale blockhash can succeed on a rebuilt retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BlockhashNotFound)
    }

    /// Program error carried by this failure, if any.
    pub fn program_error(&self) -> Option<ProgramError> {
        match self {
            Self::Program { error, .. } => Some(*error),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BlockhashNotFound => "blockhash_not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::SignatureFailure { .. } => "signature_failure",
            Self::AccountAlreadyInUse { .. } => "account_already_in_use",
            Self::InvalidInstruction { .. } => "invalid_instruction",
            Self::UnsupportedProgram { .. } => "unsupported_program",
            Self::Program { error, .. } => error.reason(),
        }
    }
}

/// Error returned by a ledger client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger endpoint could not be reached.
    #[error("ledger RPC error: {0}")]
    Rpc(String),

    /// The transaction was rejected.
    #[error("transaction failed: {0}")]
    TransactionFailed(#[from] TransactionFailure),

    /// The wallet refused or failed to sign.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Confirmation was not reached before the caller gave up.
    #[error("confirmation at {commitment} timed out")]
    ConfirmationTimeout {
        /// Commitment level awaited.
        commitment: crate::CommitmentLevel,
    },

    /// The caller cancelled the operation.
    #[error("ledger operation cancelled")]
    Cancelled,
}

impl LedgerError {
    /// Transport failures and stale blockhashes may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(_) | Self::ConfirmationTimeout { .. } => true,
            Self::TransactionFailed(failure) => failure.is_retryable(),
            Self::Signing(_) | Self::Cancelled => false,
        }
    }
}
