//! # Prover Interface
//!
//! The zero-knowledge engine is an external collaborator. The client sees
//! it through two traits:
//!
//! - [`CircuitSource`] loads a circuit artifact for a credential type.
//!   Loads are expensive; [`crate::CircuitLoader`] deduplicates and caches
//!   them.
//! - [`ProofGenerator`] turns private inputs into proof bytes plus public
//!   inputs, and offers a best-effort local verification that is never the
//!   source of truth.
//!
//! ## Security Invariant
//!
//! [`PrivateInputs`] owns a copy of the identity secret in a
//! `Zeroizing` buffer; it is wiped when the inputs are dropped, on every
//! exit path including cancellation.

use async_trait::async_trait;
use vouch_core::{Commitment, Nullifier, ProofType, WalletId};
use vouch_crypto::{nullifier_for, IdentitySecret};
use zeroize::Zeroizing;

use crate::credential::CredentialData;
use crate::error::ProverError;

/// A loaded proving circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    /// Circuit identifier, e.g. `"whale_trading"`.
    pub id: String,
    /// Credential type the circuit proves.
    pub proof_type: ProofType,
    /// Digest of the circuit artifact, for cache diagnostics.
    pub artifact_digest: [u8; 32],
    /// Number of public inputs the circuit exposes.
    pub public_input_count: usize,
}

/// Everything the prover needs, including the secret.
pub struct PrivateInputs {
    wallet_id: WalletId,
    secret: Zeroizing<[u8; 32]>,
    commitment: Commitment,
    /// Credential facts being proven.
    pub credential: CredentialData,
    /// Public threshold the credential metric must reach.
    pub threshold: u64,
    /// Attestation epoch.
    pub epoch: u64,
}

impl PrivateInputs {
    /// Copy the secret out of `identity` into a zeroizing buffer.
    pub fn new(
        identity: &IdentitySecret,
        credential: CredentialData,
        threshold: u64,
        epoch: u64,
    ) -> Self {
        Self {
            wallet_id: *identity.wallet_id(),
            secret: Zeroizing::new(*identity.secret_bytes()),
            commitment: identity.commitment(),
            credential,
            threshold,
            epoch,
        }
    }

    /// Wallet id.
    pub fn wallet_id(&self) -> &WalletId {
        &self.wallet_id
    }

    /// Secret bytes, for the prover only.
    pub fn secret(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Commitment published as a public input.
    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Nullifier for this wallet and the credential's proof type.
    pub fn nullifier(&self) -> Nullifier {
        nullifier_for(&self.wallet_id, self.credential.proof_type())
    }
}

impl std::fmt::Debug for PrivateInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateInputs")
            .field("wallet_id", &self.wallet_id)
            .field("secret", &"<redacted>")
            .field("proof_type", &self.credential.proof_type())
            .field("threshold", &self.threshold)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Prover output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProof {
    /// Raw proof bytes.
    pub proof: Vec<u8>,
    /// Public inputs as hex strings, as the engine reports them.
    pub public_input_hexes: Vec<String>,
}

/// Loads circuit artifacts.
#[async_trait]
pub trait CircuitSource: Send + Sync {
    /// Whether the engine can be loaded in this environment at all.
    fn is_available(&self) -> bool;

    /// Fetch and initialize the circuit for `proof_type`.
    async fn fetch(&self, proof_type: ProofType) -> Result<Circuit, ProverError>;
}

/// Generates and locally checks proofs.
#[async_trait]
pub trait ProofGenerator: Send + Sync {
    /// Produce a proof for `inputs` with `circuit`.
    async fn generate(
        &self,
        circuit: &Circuit,
        inputs: &PrivateInputs,
    ) -> Result<GeneratedProof, ProverError>;

    /// Best-effort local verification. Not the source of truth.
    async fn verify_locally(
        &self,
        circuit: &Circuit,
        proof: &[u8],
        public_inputs: &[[u8; 32]],
    ) -> Result<bool, ProverError>;
}
