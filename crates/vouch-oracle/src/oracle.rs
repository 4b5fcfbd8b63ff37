//! # Verification Oracle Contract
//!
//! The oracle is an external service that verifies a zero-knowledge proof
//! and, on success, returns a verifier-signed v2 attestation message.
//!
//! ```text
//! GET  /health  -> { "status": "ok", "circuits_loaded": ... }
//! POST /verify  { proof_hex, public_inputs, proof_type, nullifier, commitment }
//!               -> { "success": bool, "attestation"?: {...}, "error"?: "..." }
//! ```
//!
//! Attestation signatures and messages arrive either as JSON byte arrays
//! or as base58 strings; [`ByteBlob`] accepts both.
//!
//! ## Security Invariant
//!
//! The client does not verify the verifier's signature. The ledger does,
//! through the Ed25519 instruction placed next to `record_attestation`.
//! The client only checks that the signed message is about the proof it
//! submitted: same nullifier, same proof type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vouch_attestation::{decode_message_v2, AttestationMessage, MESSAGE_V2_LEN};
use vouch_core::{Nullifier, ProofType};
use vouch_crypto::{Ed25519PublicKey, Ed25519Signature};
use vouch_zkp::ProofEnvelope;

use crate::error::OracleError;

/// Verifies proofs and signs attestations.
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    /// Probe `GET /health`.
    async fn health(&self) -> Result<HealthStatus, OracleError>;

    /// Submit a proof to `POST /verify`.
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, OracleError>;
}

// ─── Wire types ─────────────────────────────────────────────────────────

/// Loaded-circuit report. Oracles answer with either a count or names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CircuitsLoaded {
    /// Number of circuits ready.
    Count(u64),
    /// Identifiers of circuits ready.
    Names(Vec<String>),
}

impl Default for CircuitsLoaded {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl CircuitsLoaded {
    /// Number of circuits reported, `None` if the reported count does not
    /// fit a `usize`.
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Count(n) => usize::try_from(*n).ok(),
            Self::Names(names) => Some(names.len()),
        }
    }
}

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `"ok"` when the oracle accepts proofs.
    pub status: String,
    /// Circuits the oracle has loaded.
    #[serde(default)]
    pub circuits_loaded: CircuitsLoaded,
}

impl HealthStatus {
    /// Healthy iff `status == "ok"`.
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// `POST /verify` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Proof bytes, lowercase hex.
    pub proof_hex: String,
    /// 32-byte public inputs, lowercase hex each.
    pub public_inputs: Vec<String>,
    /// `"developer"` or `"whale"`.
    pub proof_type: ProofType,
    /// Nullifier, 64 hex chars.
    pub nullifier: String,
    /// Commitment, 64 hex chars.
    pub commitment: String,
}

impl VerifyRequest {
    /// Request for `envelope`.
    pub fn from_envelope(envelope: &ProofEnvelope, proof_type: ProofType) -> Self {
        Self {
            proof_hex: vouch_core::hex::encode(&envelope.proof),
            public_inputs: envelope.public_input_hexes(),
            proof_type,
            nullifier: envelope.nullifier.to_ascii_lowercase(),
            commitment: envelope.commitment.to_ascii_lowercase(),
        }
    }
}

/// `POST /verify` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the proof verified.
    pub success: bool,
    /// Signed attestation, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<WireAttestation>,
    /// Rejection reason, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Attestation as the oracle sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAttestation {
    /// 64-byte Ed25519 signature.
    pub signature: ByteBlob,
    /// 125-byte v2 message.
    #[serde(alias = "signed_message", alias = "signedMessage")]
    pub message: ByteBlob,
    /// Verifier public key, base58.
    #[serde(default, alias = "public_key", alias = "publicKey", skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
}

/// Binary value sent as a JSON byte array or a base58 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ByteBlob {
    /// `[12, 34, ...]`
    Bytes(Vec<u8>),
    /// Base58 text.
    Base58(String),
}

impl ByteBlob {
    /// Raw bytes. `field` names the value in the error.
    pub fn to_bytes(&self, field: &str) -> Result<Vec<u8>, OracleError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Base58(text) => bs58::decode(text.trim()).into_vec().map_err(|e| {
                OracleError::SignatureDecodeError(format!("{field} is not valid base58: {e}"))
            }),
        }
    }
}

// ─── Normalization ──────────────────────────────────────────────────────

/// Attestation decoded into ledger-ready parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedAttestation {
    /// Decoded v2 message.
    pub message: AttestationMessage,
    /// Verifier signature over `message.encode()`.
    pub signature: Ed25519Signature,
    /// Key the oracle claims signed it, when reported.
    pub verifier: Option<Ed25519PublicKey>,
}

/// Decode `wire` and check it attests to `nullifier` for `proof_type`.
pub fn normalize_attestation(
    wire: &WireAttestation,
    nullifier: &Nullifier,
    proof_type: ProofType,
) -> Result<SignedAttestation, OracleError> {
    let signature_bytes = wire.signature.to_bytes("signature")?;
    let signature = Ed25519Signature::from_slice(&signature_bytes).map_err(|_| {
        OracleError::SignatureDecodeError(format!(
            "signature must be 64 bytes, got {}",
            signature_bytes.len()
        ))
    })?;

    let message_bytes = wire.message.to_bytes("message")?;
    if message_bytes.len() != MESSAGE_V2_LEN {
        return Err(OracleError::SignatureDecodeError(format!(
            "message must be {MESSAGE_V2_LEN} bytes, got {}",
            message_bytes.len()
        )));
    }
    let message = decode_message_v2(&message_bytes)
        .map_err(|e| OracleError::SignatureDecodeError(e.to_string()))?;

    if message.nullifier != *nullifier {
        return Err(OracleError::SignatureDecodeError(format!(
            "attestation is for nullifier {}, submitted {}",
            message.nullifier.short(),
            nullifier.short()
        )));
    }
    if message.proof_type != proof_type {
        return Err(OracleError::SignatureDecodeError(format!(
            "attestation is for a {} proof, submitted {proof_type}",
            message.proof_type
        )));
    }

    let verifier = wire
        .verifier
        .as_deref()
        .map(Ed25519PublicKey::from_base58)
        .transpose()
        .map_err(|e| OracleError::SignatureDecodeError(format!("verifier key: {e}")))?;

    Ok(SignedAttestation {
        message,
        signature,
        verifier,
    })
}
