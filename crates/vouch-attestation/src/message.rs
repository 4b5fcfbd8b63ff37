//! # Attestation Message v2
//!
//! The 125-byte preimage the verifier signs and the ledger program checks
//! through Ed25519 signature introspection.
//!
//! ```text
//! offset  len  field
//!      0   20  "vouch_attestation_v2"
//!     20    1  proof-type tag (1 = developer, 2 = whale)
//!     21   32  nullifier
//!     53    8  epoch, big-endian u64
//!     61   32  data_hash
//!     93   32  attestation_hash
//! ```
//!
//! ## Security Invariant
//!
//! The layout is exact and order-dependent. Any change requires a new
//! domain separator; existing bytes are never reinterpreted in place.

use serde::{Deserialize, Serialize};
use vouch_core::{AttestationHash, DataHash, Nullifier, ProofType, ValidationError};

/// Domain separator occupying the first 20 bytes.
pub const DOMAIN_V2: &[u8; 20] = b"vouch_attestation_v2";

/// Total encoded length.
pub const MESSAGE_V2_LEN: usize = 125;

const TAG_OFFSET: usize = 20;
const NULLIFIER_OFFSET: usize = 21;
const EPOCH_OFFSET: usize = 53;
const DATA_HASH_OFFSET: usize = 61;
const ATTESTATION_HASH_OFFSET: usize = 93;

/// Decoded v2 attestation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationMessage {
    /// Credential type.
    pub proof_type: ProofType,
    /// Nullifier the attestation consumes.
    pub nullifier: Nullifier,
    /// Coarse time bucket bounding replay.
    pub epoch: u64,
    /// Digest of the credential data.
    pub data_hash: DataHash,
    /// Verifier's verdict digest.
    pub attestation_hash: AttestationHash,
}

impl AttestationMessage {
    /// Encode into the fixed 125-byte layout.
    pub fn encode(&self) -> [u8; MESSAGE_V2_LEN] {
        let mut out = [0u8; MESSAGE_V2_LEN];
        out[..TAG_OFFSET].copy_from_slice(DOMAIN_V2);
        out[TAG_OFFSET] = self.proof_type.tag();
        out[NULLIFIER_OFFSET..EPOCH_OFFSET].copy_from_slice(self.nullifier.as_bytes());
        out[EPOCH_OFFSET..DATA_HASH_OFFSET].copy_from_slice(&self.epoch.to_be_bytes());
        out[DATA_HASH_OFFSET..ATTESTATION_HASH_OFFSET].copy_from_slice(self.data_hash.as_bytes());
        out[ATTESTATION_HASH_OFFSET..].copy_from_slice(self.attestation_hash.as_bytes());
        out
    }

    /// Strict parse of a 125-byte v2 message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.len() != MESSAGE_V2_LEN {
            return Err(ValidationError::TruncatedMessage {
                expected: MESSAGE_V2_LEN,
                actual: bytes.len(),
            });
        }
        if &bytes[..TAG_OFFSET] != DOMAIN_V2 {
            return Err(ValidationError::MalformedField {
                field: "domain_separator",
                reason: "expected \"vouch_attestation_v2\"".to_string(),
            });
        }
        let proof_type = ProofType::from_tag(bytes[TAG_OFFSET])?;
        let nullifier = Nullifier::from_slice(&bytes[NULLIFIER_OFFSET..EPOCH_OFFSET])?;
        let mut epoch = [0u8; 8];
        epoch.copy_from_slice(&bytes[EPOCH_OFFSET..DATA_HASH_OFFSET]);
        let data_hash = DataHash::from_slice(&bytes[DATA_HASH_OFFSET..ATTESTATION_HASH_OFFSET])?;
        let attestation_hash = AttestationHash::from_slice(&bytes[ATTESTATION_HASH_OFFSET..])?;
        Ok(Self {
            proof_type,
            nullifier,
            epoch: u64::from_be_bytes(epoch),
            data_hash,
            attestation_hash,
        })
    }
}

/// Build the v2 message from loosely typed parts.
///
/// Each hash must be exactly 32 bytes, otherwise `MalformedField` names the
/// offending field.
pub fn encode_message_v2(
    proof_type: ProofType,
    nullifier: &[u8],
    epoch: u64,
    data_hash: &[u8],
    attestation_hash: &[u8],
) -> Result<[u8; MESSAGE_V2_LEN], ValidationError> {
    let msg = AttestationMessage {
        proof_type,
        nullifier: Nullifier(fixed32("nullifier", nullifier)?),
        epoch,
        data_hash: DataHash(fixed32("data_hash", data_hash)?),
        attestation_hash: AttestationHash(fixed32("attestation_hash", attestation_hash)?),
    };
    Ok(msg.encode())
}

/// Parse a v2 message. Fails with `TruncatedMessage` unless exactly 125 bytes.
pub fn decode_message_v2(bytes: &[u8]) -> Result<AttestationMessage, ValidationError> {
    AttestationMessage::decode(bytes)
}

pub(crate) fn fixed32(field: &'static str, bytes: &[u8]) -> Result<[u8; 32], ValidationError> {
    bytes
        .try_into()
        .map_err(|_| ValidationError::wrong_length(field, 32, bytes.len()))
}
