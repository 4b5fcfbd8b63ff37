//! # In-Process Oracle
//!
//! A [`VerificationOracle`] that runs in the client process with its own
//! verifier key. The simulator and tests use it in place of the HTTP
//! service.
//!
//! It decodes the 98 public inputs, checks they bind the submitted
//! nullifier and commitment, optionally re-verifies the proof with a local
//! [`ProofGenerator`], then signs a v2 message whose epoch and data hash
//! come from the public inputs rather than from the caller.
//!
//! ## Security Notice
//!
//! Holds a verifier private key in memory. Not for production use.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use vouch_attestation::AttestationMessage;
use vouch_core::{AttestationHash, Commitment, Nullifier};
use vouch_crypto::{sha256_concat, Ed25519KeyPair, Ed25519PublicKey};
use vouch_zkp::{CircuitLoader, ProofGenerator, PublicInputs};

use crate::error::OracleError;
use crate::oracle::{
    ByteBlob, CircuitsLoaded, HealthStatus, VerificationOracle, VerifyRequest, VerifyResponse,
    WireAttestation,
};

/// Domain tag mixed into the verdict digest.
const VERDICT_DOMAIN: &[u8] = b"vouch_verdict_v1";

/// Signing oracle backed by a local key pair.
pub struct LocalOracle {
    keypair: Ed25519KeyPair,
    verifier: Option<(Arc<dyn ProofGenerator>, Arc<CircuitLoader>)>,
    healthy: AtomicBool,
    forced_rejection: Mutex<Option<String>>,
    verify_calls: AtomicUsize,
}

impl std::fmt::Debug for LocalOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalOracle")
            .field("verifier", &self.keypair.public_key())
            .field("checks_proofs", &self.verifier.is_some())
            .field("healthy", &self.healthy.load(Ordering::SeqCst))
            .finish()
    }
}

impl LocalOracle {
    /// Oracle signing with `keypair`. Proofs are format-checked only.
    pub fn new(keypair: Ed25519KeyPair) -> Self {
        Self {
            keypair,
            verifier: None,
            healthy: AtomicBool::new(true),
            forced_rejection: Mutex::new(None),
            verify_calls: AtomicUsize::new(0),
        }
    }

    /// Also verify each proof against its circuit.
    pub fn with_proof_check(
        mut self,
        prover: Arc<dyn ProofGenerator>,
        loader: Arc<CircuitLoader>,
    ) -> Self {
        self.verifier = Some((prover, loader));
        self
    }

    /// Verifier public key that signs attestations.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Report unhealthy and refuse `/verify` until set back.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Reject every proof with `reason`, or stop doing so with `None`.
    pub fn set_rejection(&self, reason: Option<String>) {
        *self.forced_rejection.lock() = reason;
    }

    /// Number of `/verify` calls handled.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn reject(reason: impl Into<String>) -> VerifyResponse {
        VerifyResponse {
            success: false,
            attestation: None,
            error: Some(reason.into()),
        }
    }

    async fn check(&self, request: &VerifyRequest) -> Result<AttestationMessage, String> {
        let proof = vouch_core::hex::decode("proof_hex", &request.proof_hex)
            .map_err(|e| e.to_string())?;
        if proof.is_empty() {
            return Err("empty proof".to_string());
        }
        let elements = request
            .public_inputs
            .iter()
            .map(|h| vouch_core::hex::decode32("public_inputs", h))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        let decoded = PublicInputs::decode(&elements).map_err(|e| e.to_string())?;

        let nullifier = Nullifier::from_hex(&request.nullifier).map_err(|e| e.to_string())?;
        let commitment = Commitment::from_hex(&request.commitment).map_err(|e| e.to_string())?;
        if decoded.nullifier != nullifier {
            return Err("public inputs do not bind the submitted nullifier".to_string());
        }
        if decoded.commitment != commitment {
            return Err("public inputs do not bind the submitted commitment".to_string());
        }

        if let Some((prover, loader)) = &self.verifier {
            let circuit = loader
                .load(request.proof_type)
                .await
                .map_err(|e| format!("circuit unavailable: {e}"))?;
            let valid = prover
                .verify_locally(&circuit, &proof, &elements)
                .await
                .map_err(|e| e.to_string())?;
            if !valid {
                return Err("proof does not verify".to_string());
            }
        }

        let attestation_hash = AttestationHash(sha256_concat(&[
            VERDICT_DOMAIN,
            &[request.proof_type.tag()],
            &proof,
            nullifier.as_bytes(),
            commitment.as_bytes(),
        ]));
        Ok(AttestationMessage {
            proof_type: request.proof_type,
            nullifier,
            epoch: decoded.epoch,
            data_hash: decoded.data_hash,
            attestation_hash,
        })
    }
}

#[async_trait]
impl VerificationOracle for LocalOracle {
    async fn health(&self) -> Result<HealthStatus, OracleError> {
        let status = if self.healthy.load(Ordering::SeqCst) { "ok" } else { "unavailable" };
        Ok(HealthStatus {
            status: status.to_string(),
            circuits_loaded: CircuitsLoaded::Count(2),
        })
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, OracleError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(OracleError::OracleUnavailable("local oracle disabled".to_string()));
        }
        if let Some(reason) = self.forced_rejection.lock().clone() {
            return Ok(Self::reject(reason));
        }
        let message = match self.check(request).await {
            Ok(message) => message,
            Err(reason) => {
                tracing::debug!(%reason, "local oracle rejected proof");
                return Ok(Self::reject(reason));
            }
        };
        let encoded = message.encode();
        let signature = self.keypair.sign(&encoded);
        Ok(VerifyResponse {
            success: true,
            attestation: Some(WireAttestation {
                signature: ByteBlob::Base58(bs58::encode(signature.as_bytes()).into_string()),
                message: ByteBlob::Bytes(encoded.to_vec()),
                verifier: Some(self.keypair.public_key().to_base58()),
            }),
            error: None,
        })
    }
}
