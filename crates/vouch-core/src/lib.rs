//! # vouch-core — Foundational Types for the Vouch Protocol Client
//!
//! Leaf crate of the workspace. Every other `vouch-*` crate depends on it;
//! it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtypes for 32-byte protocol values.** `WalletId`, `Commitment`,
//!    `Nullifier`, `DataHash`, `AttestationHash` are distinct types. A
//!    commitment cannot be passed where a nullifier is expected.
//!
//! 2. **Single `ProofType` enum.** The on-chain tag, the nullifier domain
//!    separator, the circuit id and the wire name all hang off one enum, so
//!    adding a credential type forces every consumer to handle it.
//!
//! 3. **Injected time.** Nothing in the protocol layer calls the system clock
//!    directly; it takes a [`Clock`]. Tests drive time with [`ManualClock`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `vouch-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod clock;
pub mod error;
pub mod hex;
pub mod identity;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ValidationError;
pub use identity::{
    AttestationHash, Commitment, DataHash, Network, Nullifier, ProofType, WalletId,
    PUBLIC_INPUT_COUNT,
};
