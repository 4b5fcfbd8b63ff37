//! # Ledger Instructions
//!
//! Builders for every instruction the client sends to the ledger, plus the
//! parsers the in-memory ledger model uses to read them back.
//!
//! ## Wire formats
//!
//! Vouch program instructions start with an 8-byte discriminator,
//! `SHA-256("global:<name>")[..8]`:
//!
//! ```text
//! record_attestation  disc(8) ‖ attestation_hash(32) ‖ proof_type(1) ‖ nullifier(32) ‖ signature(64)  = 137
//! init_nullifier      disc(8) ‖ nullifier(32)                                                      = 40
//! init_rate_limit     disc(8)                                                                      = 8
//! ```
//!
//! The native Ed25519 verify instruction carries one signature:
//!
//! ```text
//! 0   u8   num_signatures (1)
//! 1   u8   padding
//! 2   u16  signature_offset            (48)
//! 4   u16  signature_instruction_index (0xFFFF = this instruction)
//! 6   u16  public_key_offset           (16)
//! 8   u16  public_key_instruction_index
//! 10  u16  message_data_offset         (112)
//! 12  u16  message_data_size
//! 14  u16  message_instruction_index
//! 16       public key (32) ‖ signature (64) ‖ message
//! ```
//!
//! ## Security Invariant
//!
//! The verify instruction must sit immediately before `record_attestation`
//! in the same transaction; the ledger program inspects the preceding
//! instruction to find the signature proof.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use vouch_core::{AttestationHash, Nullifier, ProofType, ValidationError};
use vouch_crypto::{sha256, Ed25519PublicKey, Ed25519Signature};

use crate::address::{
    config_address, nullifier_record_address, rate_limit_address, verifier_address, Address,
};
use crate::error::AddressError;
use crate::message::{fixed32, AttestationMessage};

/// Length of the `record_attestation` payload.
pub const RECORD_INSTRUCTION_LEN: usize = 137;
/// Length of the `init_nullifier` payload.
pub const INIT_NULLIFIER_LEN: usize = 40;

const ED25519_HEADER_LEN: usize = 16;
const ED25519_PUBKEY_OFFSET: u16 = 16;
const ED25519_SIGNATURE_OFFSET: u16 = 48;
const ED25519_MESSAGE_OFFSET: u16 = 112;
/// Instruction index meaning "data lives in this same instruction".
pub const CURRENT_INSTRUCTION: u16 = u16::MAX;

// ─── Instruction model ───────────────────────────────────────────────

/// One account reference of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    /// Account address.
    pub pubkey: Address,
    /// Whether the account must sign the transaction.
    pub is_signer: bool,
    /// Whether the instruction may mutate the account.
    pub is_writable: bool,
}

impl AccountMeta {
    /// Writable account.
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// Read-only account.
    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Program to invoke.
    pub program_id: Address,
    /// Accounts, in the order the program expects.
    pub accounts: Vec<AccountMeta>,
    /// Opaque instruction data.
    #[serde(with = "vouch_core::hex::serde_bytes")]
    pub data: Vec<u8>,
}

// ─── Discriminators ──────────────────────────────────────────────────

/// `SHA-256("global:<name>")[..8]`.
pub fn discriminator(name: &str) -> [u8; 8] {
    let digest = sha256(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn record_attestation_disc() -> &'static [u8; 8] {
    static DISC: OnceLock<[u8; 8]> = OnceLock::new();
    DISC.get_or_init(|| discriminator("record_attestation"))
}

fn init_nullifier_disc() -> &'static [u8; 8] {
    static DISC: OnceLock<[u8; 8]> = OnceLock::new();
    DISC.get_or_init(|| discriminator("init_nullifier"))
}

fn init_rate_limit_disc() -> &'static [u8; 8] {
    static DISC: OnceLock<[u8; 8]> = OnceLock::new();
    DISC.get_or_init(|| discriminator("init_rate_limit"))
}

// ─── Payload encoding ────────────────────────────────────────────────

/// Build the 137-byte `record_attestation` payload.
///
/// `nullifier` must equal the one carried by `attestation`; a mismatch is
/// rejected rather than silently packaged.
pub fn encode_record_instruction(
    attestation: &AttestationMessage,
    nullifier: &[u8],
    signature: &[u8],
) -> Result<[u8; RECORD_INSTRUCTION_LEN], ValidationError> {
    let nullifier = fixed32("nullifier", nullifier)?;
    if &nullifier != attestation.nullifier.as_bytes() {
        return Err(ValidationError::MalformedField {
            field: "nullifier",
            reason: "does not match the attestation message".to_string(),
        });
    }
    let signature: [u8; 64] = signature
        .try_into()
        .map_err(|_| ValidationError::wrong_length("signature", 64, signature.len()))?;

    let mut out = [0u8; RECORD_INSTRUCTION_LEN];
    out[..8].copy_from_slice(record_attestation_disc());
    out[8..40].copy_from_slice(attestation.attestation_hash.as_bytes());
    out[40] = attestation.proof_type.tag();
    out[41..73].copy_from_slice(&nullifier);
    out[73..].copy_from_slice(&signature);
    Ok(out)
}

/// 40-byte `init_nullifier` payload.
pub fn encode_init_nullifier(nullifier: &Nullifier) -> [u8; INIT_NULLIFIER_LEN] {
    let mut out = [0u8; INIT_NULLIFIER_LEN];
    out[..8].copy_from_slice(init_nullifier_disc());
    out[8..].copy_from_slice(nullifier.as_bytes());
    out
}

/// 8-byte `init_rate_limit` payload.
pub fn encode_init_rate_limit() -> [u8; 8] {
    *init_rate_limit_disc()
}

/// Native Ed25519 program data for one signature over `message`.
pub fn encode_ed25519_verify(
    public_key: &Ed25519PublicKey,
    signature: &Ed25519Signature,
    message: &[u8],
) -> Result<Vec<u8>, ValidationError> {
    let message_size = u16::try_from(message.len()).map_err(|_| ValidationError::MalformedField {
        field: "message",
        reason: format!("{} bytes does not fit a u16 length", message.len()),
    })?;

    let mut data = Vec::with_capacity(usize::from(ED25519_MESSAGE_OFFSET) + message.len());
    data.push(1u8);
    data.push(0u8);
    for word in [
        ED25519_SIGNATURE_OFFSET,
        CURRENT_INSTRUCTION,
        ED25519_PUBKEY_OFFSET,
        CURRENT_INSTRUCTION,
        ED25519_MESSAGE_OFFSET,
        message_size,
        CURRENT_INSTRUCTION,
    ] {
        data.extend_from_slice(&word.to_le_bytes());
    }
    debug_assert_eq!(data.len(), ED25519_HEADER_LEN);
    data.extend_from_slice(public_key.as_bytes());
    data.extend_from_slice(signature.as_bytes());
    data.extend_from_slice(message);
    Ok(data)
}

// ─── Payload decoding ────────────────────────────────────────────────

/// Signature proof extracted from an Ed25519 verify instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519VerifyPayload {
    /// Signing key.
    pub public_key: Ed25519PublicKey,
    /// Signature.
    pub signature: Ed25519Signature,
    /// Signed message.
    pub message: Vec<u8>,
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

/// Parse a single-signature Ed25519 verify instruction whose data is
/// entirely self-contained.
pub fn decode_ed25519_verify(data: &[u8]) -> Result<Ed25519VerifyPayload, ValidationError> {
    if data.len() < ED25519_HEADER_LEN {
        return Err(ValidationError::TruncatedMessage {
            expected: ED25519_HEADER_LEN,
            actual: data.len(),
        });
    }
    if data[0] != 1 {
        return Err(ValidationError::MalformedField {
            field: "num_signatures",
            reason: format!("expected 1, got {}", data[0]),
        });
    }
    let sig_offset = usize::from(read_u16(data, 2));
    let pk_offset = usize::from(read_u16(data, 6));
    let msg_offset = usize::from(read_u16(data, 10));
    let msg_size = usize::from(read_u16(data, 12));
    for (field, at) in [
        ("signature_instruction_index", 4),
        ("public_key_instruction_index", 8),
        ("message_instruction_index", 14),
    ] {
        if read_u16(data, at) != CURRENT_INSTRUCTION {
            return Err(ValidationError::MalformedField {
                field,
                reason: "cross-instruction references are not supported".to_string(),
            });
        }
    }

    let slice = |field: &'static str, offset: usize, len: usize| {
        data.get(offset..offset + len)
            .ok_or_else(|| ValidationError::MalformedField {
                field,
                reason: format!("range {offset}..{} out of bounds", offset + len),
            })
    };
    let public_key = Ed25519PublicKey::from_slice(slice("public_key", pk_offset, 32)?)
        .map_err(|e| ValidationError::MalformedField {
            field: "public_key",
            reason: e.to_string(),
        })?;
    let signature = Ed25519Signature::from_slice(slice("signature", sig_offset, 64)?)
        .map_err(|e| ValidationError::MalformedField {
            field: "signature",
            reason: e.to_string(),
        })?;
    let message = slice("message", msg_offset, msg_size)?.to_vec();
    Ok(Ed25519VerifyPayload {
        public_key,
        signature,
        message,
    })
}

/// A decoded Vouch program instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VouchInstruction {
    /// Create the nullifier record.
    InitNullifier {
        /// Nullifier being registered.
        nullifier: Nullifier,
    },
    /// Create the recipient's rate-limit record.
    InitRateLimit,
    /// Record a verifier-signed attestation.
    RecordAttestation {
        /// Verifier verdict digest.
        attestation_hash: AttestationHash,
        /// Credential type.
        proof_type: ProofType,
        /// Nullifier consumed.
        nullifier: Nullifier,
        /// Verifier signature over the v2 message.
        signature: Ed25519Signature,
    },
}

impl VouchInstruction {
    /// Parse instruction data by discriminator.
    pub fn unpack(data: &[u8]) -> Result<Self, ValidationError> {
        if data.len() < 8 {
            return Err(ValidationError::TruncatedMessage {
                expected: 8,
                actual: data.len(),
            });
        }
        let (disc, rest) = data.split_at(8);
        if disc == init_nullifier_disc() {
            if data.len() != INIT_NULLIFIER_LEN {
                return Err(ValidationError::TruncatedMessage {
                    expected: INIT_NULLIFIER_LEN,
                    actual: data.len(),
                });
            }
            return Ok(Self::InitNullifier {
                nullifier: Nullifier::from_slice(rest)?,
            });
        }
        if disc == init_rate_limit_disc() {
            if !rest.is_empty() {
                return Err(ValidationError::TruncatedMessage {
                    expected: 8,
                    actual: data.len(),
                });
            }
            return Ok(Self::InitRateLimit);
        }
        if disc == record_attestation_disc() {
            if data.len() != RECORD_INSTRUCTION_LEN {
                return Err(ValidationError::TruncatedMessage {
                    expected: RECORD_INSTRUCTION_LEN,
                    actual: data.len(),
                });
            }
            let signature = Ed25519Signature::from_slice(&data[73..]).map_err(|e| {
                ValidationError::MalformedField {
                    field: "signature",
                    reason: e.to_string(),
                }
            })?;
            return Ok(Self::RecordAttestation {
                attestation_hash: AttestationHash::from_slice(&data[8..40])?,
                proof_type: ProofType::from_tag(data[40])?,
                nullifier: Nullifier::from_slice(&data[41..73])?,
                signature,
            });
        }
        Err(ValidationError::MalformedField {
            field: "discriminator",
            reason: format!("unknown instruction {}", vouch_core::hex::encode(disc)),
        })
    }
}

// ─── Instruction builders ────────────────────────────────────────────

/// `init_nullifier`: nullifier record (w), payer (s, w), system program.
pub fn init_nullifier_ix(
    program_id: &Address,
    payer: &Address,
    nullifier: &Nullifier,
) -> Result<Instruction, AddressError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(nullifier_record_address(program_id, nullifier)?, false),
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(Address::SYSTEM_PROGRAM, false),
        ],
        data: encode_init_nullifier(nullifier).to_vec(),
    })
}

/// `init_rate_limit`: rate-limit record (w), recipient, payer (s, w),
/// system program.
pub fn init_rate_limit_ix(
    program_id: &Address,
    payer: &Address,
    recipient: &Address,
) -> Result<Instruction, AddressError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(rate_limit_address(program_id, recipient)?, false),
            AccountMeta::readonly(*recipient, false),
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(Address::SYSTEM_PROGRAM, false),
        ],
        data: encode_init_rate_limit().to_vec(),
    })
}

/// Native Ed25519 verify instruction. Takes no accounts.
pub fn ed25519_verify_ix(
    public_key: &Ed25519PublicKey,
    signature: &Ed25519Signature,
    message: &[u8],
) -> Result<Instruction, ValidationError> {
    Ok(Instruction {
        program_id: Address::ED25519_PROGRAM,
        accounts: Vec::new(),
        data: encode_ed25519_verify(public_key, signature, message)?,
    })
}

/// Everything `record_attestation_ix` needs besides the payload.
#[derive(Debug, Clone, Copy)]
pub struct RecordAccounts {
    /// Ledger program id.
    pub program_id: Address,
    /// Fee payer and transaction signer.
    pub payer: Address,
    /// Wallet receiving the credential; keys the rate-limit record.
    pub recipient: Address,
    /// Verifier whose signature is being recorded.
    pub verifier: Ed25519PublicKey,
}

/// `record_attestation`: config (w), verifier record (w), nullifier record
/// (w), rate-limit record (w), recipient, payer (s, w), instructions sysvar.
pub fn record_attestation_ix(
    accounts: &RecordAccounts,
    attestation: &AttestationMessage,
    signature: &Ed25519Signature,
) -> Result<Instruction, RecordIxError> {
    let program_id = &accounts.program_id;
    let data = encode_record_instruction(
        attestation,
        attestation.nullifier.as_bytes(),
        signature.as_bytes(),
    )?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(config_address(program_id)?, false),
            AccountMeta::writable(verifier_address(program_id, &accounts.verifier)?, false),
            AccountMeta::writable(
                nullifier_record_address(program_id, &attestation.nullifier)?,
                false,
            ),
            AccountMeta::writable(rate_limit_address(program_id, &accounts.recipient)?, false),
            AccountMeta::readonly(accounts.recipient, false),
            AccountMeta::writable(accounts.payer, true),
            AccountMeta::readonly(Address::INSTRUCTIONS_SYSVAR, false),
        ],
        data: data.to_vec(),
    })
}

/// Failure building the `record_attestation` instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordIxError {
    /// Payload encoding failed.
    #[error(transparent)]
    Encoding(#[from] ValidationError),
    /// PDA derivation failed.
    #[error(transparent)]
    Address(#[from] AddressError),
}
