//! # vouch-ledger — Replay and Rate-Limit Ledger
//!
//! The client never re-implements the ledger program; it talks to it
//! through [`LedgerClient`] and signs through [`TransactionSigner`].
//!
//! - [`transaction`]: transactions, signatures and commitment levels.
//! - [`error`]: failure taxonomy, with the program's own error numbering.
//! - [`memory`]: an in-memory model of the program (nullifier records,
//!   per-recipient rate limits, verifier registry, pause switch) for tests
//!   and simulation.
//!
//! ## Crate Policy
//!
//! - Nullifier uniqueness is the only cross-flow invariant and it is
//!   enforced here, not by client-side locking.
//! - A stale blockhash is the only retryable transaction failure.
//!   Insufficient funds is terminal.

pub mod client;
pub mod error;
pub mod memory;
pub mod params;
pub mod transaction;

pub use client::{KeypairSigner, LedgerClient, TransactionSigner};
pub use error::{LedgerError, ProgramError, TransactionFailure};
pub use memory::{ConfigRecord, InMemoryLedger, NullifierRecord, RateLimitRecord, VerifierRecord};
pub use params::{LedgerParams, DEFAULT_COOLDOWN_SECONDS, DEFAULT_MAX_PROOFS_PER_DAY, SECONDS_PER_DAY};
pub use transaction::{Blockhash, CommitmentLevel, SignedTransaction, Transaction, TxSignature};
