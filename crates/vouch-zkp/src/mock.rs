//! # Mock Prover
//!
//! A deterministic, transparent stand-in for the proving engine. Proofs are
//! SHA-256 expansions of the circuit id and public inputs, so they verify
//! locally but provide no zero-knowledge property.
//!
//! Public inputs follow [`crate::layout`].
//!
//! ## Security Notice
//!
//! Test and simulation use only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vouch_core::ProofType;
use vouch_crypto::{sha256, sha256_concat};

use crate::error::ProverError;
use crate::layout::PublicInputs;
use crate::traits::{Circuit, CircuitSource, GeneratedProof, PrivateInputs, ProofGenerator};

/// Proof length produced by default.
pub const MOCK_PROOF_LEN: usize = 256;

/// Expand the public inputs into `len` proof bytes bound to `circuit_id`.
fn expand(circuit_id: &str, public_inputs: &[[u8; 32]], len: usize) -> Vec<u8> {
    let mut seed_parts: Vec<&[u8]> = vec![circuit_id.as_bytes()];
    seed_parts.extend(public_inputs.iter().map(|el| el.as_slice()));
    let seed = sha256_concat(&seed_parts);

    let mut out = Vec::with_capacity(len);
    let mut counter: u32 = 0;
    while out.len() < len {
        let block = sha256_concat(&[&seed, &counter.to_be_bytes()]);
        let take = (len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);
        counter = counter.wrapping_add(1);
    }
    out
}

/// Build the 98-element public input vector for `inputs`.
pub fn mock_public_inputs(inputs: &PrivateInputs) -> Vec<[u8; 32]> {
    PublicInputs {
        nullifier: inputs.nullifier(),
        commitment: inputs.commitment(),
        data_hash: inputs.credential.data_hash(),
        threshold: inputs.threshold,
        epoch: inputs.epoch,
    }
    .encode()
}

/// Deterministic prover. Knobs let tests produce malformed or slow proofs.
#[derive(Debug)]
pub struct MockProofGenerator {
    proof_len: usize,
    public_input_count: Option<usize>,
    delay: Option<Duration>,
    fail_with: Option<ProverError>,
    calls: AtomicUsize,
}

impl Default for MockProofGenerator {
    fn default() -> Self {
        Self {
            proof_len: MOCK_PROOF_LEN,
            public_input_count: None,
            delay: None,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockProofGenerator {
    /// Well-formed proofs of [`MOCK_PROOF_LEN`] bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit proofs of `len` bytes.
    pub fn with_proof_len(mut self, len: usize) -> Self {
        self.proof_len = len;
        self
    }

    /// Truncate or pad the public inputs to `count` elements.
    pub fn with_public_input_count(mut self, count: usize) -> Self {
        self.public_input_count = Some(count);
        self
    }

    /// Sleep before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always fail with `err`.
    pub fn failing(mut self, err: ProverError) -> Self {
        self.fail_with = Some(err);
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProofGenerator for MockProofGenerator {
    async fn generate(
        &self,
        circuit: &Circuit,
        inputs: &PrivateInputs,
    ) -> Result<GeneratedProof, ProverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        if circuit.proof_type != inputs.credential.proof_type() {
            return Err(ProverError::Unsatisfiable(format!(
                "circuit {} cannot prove a {} credential",
                circuit.id,
                inputs.credential.proof_type()
            )));
        }
        // A real circuit has no satisfying witness below the threshold.
        if !inputs.credential.meets_threshold(inputs.threshold) {
            return Err(ProverError::Unsatisfiable(
                "credential metric below threshold".to_string(),
            ));
        }

        let mut public_inputs = mock_public_inputs(inputs);
        if let Some(count) = self.public_input_count {
            public_inputs.resize(count, [0u8; 32]);
        }
        let proof = expand(&circuit.id, &public_inputs, self.proof_len);
        Ok(GeneratedProof {
            proof,
            public_input_hexes: public_inputs.iter().map(|el| vouch_core::hex::encode(el)).collect(),
        })
    }

    async fn verify_locally(
        &self,
        circuit: &Circuit,
        proof: &[u8],
        public_inputs: &[[u8; 32]],
    ) -> Result<bool, ProverError> {
        Ok(!proof.is_empty() && expand(&circuit.id, public_inputs, proof.len()) == proof)
    }
}

/// Circuit source returning synthetic artifacts, counting fetches.
#[derive(Debug, Default)]
pub struct MockCircuitSource {
    delay: Option<Duration>,
    unavailable: bool,
    fetches: AtomicUsize,
}

impl MockCircuitSource {
    /// Source that loads immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep in every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report the engine as missing.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Number of fetches that actually ran.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CircuitSource for MockCircuitSource {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn fetch(&self, proof_type: ProofType) -> Result<Circuit, ProverError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(ProverError::CircuitUnavailable {
                circuit_id: proof_type.circuit_id().to_string(),
                reason: "proving engine not installed".to_string(),
            });
        }
        Ok(Circuit {
            id: proof_type.circuit_id().to_string(),
            proof_type,
            artifact_digest: sha256(proof_type.circuit_id().as_bytes()),
            public_input_count: proof_type.expected_public_inputs(),
        })
    }
}
