//! # vouch-attestation — Ledger Wire Formats
//!
//! The most compatibility-sensitive part of the client. Everything here must
//! byte-match the deployed ledger program:
//!
//! - [`message`]: the 125-byte v2 attestation message the verifier signs.
//! - [`instruction`]: `record_attestation`, `init_nullifier`,
//!   `init_rate_limit` and native Ed25519 verify instructions.
//! - [`address`]: base58 addresses and program-derived record addresses.
//!
//! ## Versioning
//!
//! Only the v2 message exists. The older 82-byte layout without epoch and
//! data hash is not accepted by the ledger and is not implemented here; a
//! future layout gets a new domain separator.

pub mod address;
pub mod error;
pub mod instruction;
pub mod message;

pub use address::{
    config_address, create_program_address, find_program_address, nullifier_record_address,
    rate_limit_address, verifier_address, Address,
};
pub use error::AddressError;
pub use instruction::{
    decode_ed25519_verify, discriminator, ed25519_verify_ix, encode_ed25519_verify,
    encode_init_nullifier, encode_init_rate_limit, encode_record_instruction, init_nullifier_ix,
    init_rate_limit_ix, record_attestation_ix, AccountMeta, Ed25519VerifyPayload, Instruction,
    RecordAccounts, RecordIxError, VouchInstruction, RECORD_INSTRUCTION_LEN,
};
pub use message::{
    decode_message_v2, encode_message_v2, AttestationMessage, DOMAIN_V2, MESSAGE_V2_LEN,
};
