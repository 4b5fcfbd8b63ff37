//! # vouch-zkp — Proof Layer
//!
//! - **Envelope** ([`envelope`]): the proof plus submission metadata, its
//!   size, hex and TTL validation, and the format-only check used when the
//!   verification oracle is unreachable.
//! - **Prover interface** ([`traits`]): the external proving engine as a
//!   capability with an explicit availability probe.
//! - **Circuit loader** ([`loader`]): deduplicated, TTL-cached circuit
//!   loads with compare-and-clear reset.
//! - **Public input layout** ([`layout`]): how the 98 circuit outputs map
//!   back to nullifier, commitment, data hash, threshold and epoch.
//! - **Proof cache** ([`cache`]): persisted envelopes keyed by wallet,
//!   proof type and threshold.
//!
//! The `mock` feature (on by default) provides a deterministic prover for
//! tests and the CLI simulator. It has no zero-knowledge property.

pub mod cache;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod layout;
pub mod loader;
#[cfg(feature = "mock")]
pub mod mock;
pub mod traits;

pub use cache::{CacheKey, ProofCache, DEFAULT_CACHE_TTL_MS};
pub use credential::CredentialData;
pub use envelope::{
    check_format, compute_expiration, current_epoch, deserialize, is_expired, serialize, validate,
    validate_public_inputs, validate_size, FormatReport, ProofEnvelope, VerificationLevel,
    DEFAULT_TTL_MS, MAX_PROOF_SIZE, MAX_PUBLIC_INPUTS_SIZE, MAX_TTL_MS, MIN_TTL_MS,
};
pub use error::{CacheError, ProverError};
pub use layout::{field_element, PublicInputs};
pub use loader::{CircuitLoader, DEFAULT_CIRCUIT_TTL_MS};
#[cfg(feature = "mock")]
pub use mock::{mock_public_inputs, MockCircuitSource, MockProofGenerator, MOCK_PROOF_LEN};
pub use traits::{Circuit, CircuitSource, GeneratedProof, PrivateInputs, ProofGenerator};
