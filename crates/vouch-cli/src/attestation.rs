//! `vouch encode-attestation`, `vouch decode-attestation` and `vouch pda`.

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use vouch_attestation::{
    config_address, decode_message_v2, nullifier_record_address, rate_limit_address,
    verifier_address, Address, AttestationMessage,
};
use vouch_core::{hex, AttestationHash, DataHash, Nullifier, ProofType};
use vouch_crypto::Ed25519PublicKey;

use crate::{print_json, CliConfig};

// ─── encode / decode ─────────────────────────────────────────────────

/// Arguments for `vouch encode-attestation`.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Credential type.
    #[arg(long)]
    pub proof_type: ProofType,
    /// Nullifier, 32 bytes hex.
    #[arg(long)]
    pub nullifier: String,
    /// Attestation epoch (unix days).
    #[arg(long)]
    pub epoch: u64,
    /// Credential data digest, 32 bytes hex.
    #[arg(long)]
    pub data_hash: String,
    /// Verifier verdict digest, 32 bytes hex.
    #[arg(long)]
    pub attestation_hash: String,
}

/// Arguments for `vouch decode-attestation`.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Encoded message, hex.
    pub message: String,
}

/// Build the 125-byte message for `args`, hex-encoded.
pub fn encode(args: &EncodeArgs) -> Result<String> {
    let message = AttestationMessage {
        proof_type: args.proof_type,
        nullifier: Nullifier::from_hex(&args.nullifier)?,
        epoch: args.epoch,
        data_hash: DataHash::from_hex(&args.data_hash)?,
        attestation_hash: AttestationHash::from_hex(&args.attestation_hash)?,
    };
    Ok(hex::encode(&message.encode()))
}

/// Parse a hex-encoded v2 message.
pub fn decode(args: &DecodeArgs) -> Result<AttestationMessage> {
    let bytes = hex::decode("message", &args.message)?;
    Ok(decode_message_v2(&bytes)?)
}

/// Execute `vouch encode-attestation`.
pub fn run_encode(args: &EncodeArgs) -> Result<u8> {
    println!("{}", encode(args)?);
    Ok(0)
}

/// Execute `vouch decode-attestation`.
pub fn run_decode(args: &DecodeArgs) -> Result<u8> {
    print_json(&decode(args)?)?;
    Ok(0)
}

// ─── pda ─────────────────────────────────────────────────────────────

/// Program-derived account kinds.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PdaKind {
    /// Spent-nullifier marker. Key: nullifier hex.
    Nullifier,
    /// Per-recipient rate-limit record. Key: recipient address.
    RateLimit,
    /// Program configuration. No key.
    Config,
    /// Authorized verifier record. Key: verifier public key, base58.
    Verifier,
}

/// Arguments for `vouch pda`.
#[derive(Args, Debug)]
pub struct PdaArgs {
    /// Account kind.
    #[arg(value_enum)]
    pub kind: PdaKind,
    /// Seed key, format depending on the kind.
    pub key: Option<String>,
    /// Program id; defaults to the configured one.
    #[arg(long)]
    pub program: Option<Address>,
}

/// Output of `vouch pda`.
#[derive(Debug, Serialize)]
pub struct PdaOutput {
    /// Program the address belongs to.
    pub program: Address,
    /// Derived address.
    pub address: Address,
}

/// Derive the address for `args`.
pub fn pda(args: &PdaArgs, config: &CliConfig) -> Result<PdaOutput> {
    let program = args.program.unwrap_or(config.oracle.program_id);
    let key = args.key.as_deref();
    let address = match (args.kind, key) {
        (PdaKind::Config, None) => config_address(&program)?,
        (PdaKind::Config, Some(_)) => bail!("the config account takes no key"),
        (_, None) => bail!("a key is required for {:?} accounts", args.kind),
        (PdaKind::Nullifier, Some(k)) => {
            nullifier_record_address(&program, &Nullifier::from_hex(k)?)?
        }
        (PdaKind::RateLimit, Some(k)) => rate_limit_address(&program, &k.parse::<Address>()?)?,
        (PdaKind::Verifier, Some(k)) => {
            verifier_address(&program, &Ed25519PublicKey::from_base58(k)?)?
        }
    };
    Ok(PdaOutput { program, address })
}

/// Execute `vouch pda`.
pub fn run_pda(args: &PdaArgs, config: &CliConfig) -> Result<u8> {
    print_json(&pda(args, config)?)?;
    Ok(0)
}
