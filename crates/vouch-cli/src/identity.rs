//! `vouch derive`: the identifiers a wallet contributes to a proof.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use vouch_attestation::{nullifier_record_address, Address};
use vouch_core::{hex, Commitment, Nullifier, ProofType, WalletId};
use vouch_crypto::{derive_commitment, derive_wallet_id, nullifier_for};
use zeroize::Zeroize;

use crate::{print_json, CliConfig};

/// Arguments for `vouch derive`.
#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Wallet address, base58.
    #[arg(long)]
    pub address: Address,

    /// Credential type the nullifier is scoped to.
    #[arg(long, default_value = "whale")]
    pub proof_type: ProofType,

    /// 32-byte identity secret, hex. Without it no commitment is derived.
    #[arg(long)]
    pub secret: Option<String>,
}

/// Output of `vouch derive`.
#[derive(Debug, Serialize)]
pub struct DeriveOutput {
    /// `SHA-256(address)`.
    pub wallet_id: WalletId,
    /// Credential type.
    pub proof_type: ProofType,
    /// Per-wallet, per-type nullifier.
    pub nullifier: Nullifier,
    /// Ledger account that marks the nullifier spent.
    pub nullifier_record: Address,
    /// `SHA-256(wallet_id ‖ secret)`, when a secret was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
}

/// Compute the identifiers for `args`.
pub fn derive(args: &DeriveArgs, config: &CliConfig) -> Result<DeriveOutput> {
    let wallet_id = derive_wallet_id(&args.address.to_base58());
    let nullifier = nullifier_for(&wallet_id, args.proof_type);
    let commitment = match &args.secret {
        Some(raw) => {
            let mut secret = hex::decode32("secret", raw)?;
            let commitment = derive_commitment(&wallet_id, &secret);
            secret.zeroize();
            Some(commitment)
        }
        None => None,
    };
    Ok(DeriveOutput {
        wallet_id,
        proof_type: args.proof_type,
        nullifier,
        nullifier_record: nullifier_record_address(&config.oracle.program_id, &nullifier)?,
        commitment,
    })
}

/// Execute `vouch derive`.
pub fn run_derive(args: &DeriveArgs, config: &CliConfig) -> Result<u8> {
    print_json(&derive(args, config)?)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(secret: Option<&str>, proof_type: ProofType) -> DeriveArgs {
        DeriveArgs {
            address: Address([0x11; 32]),
            proof_type,
            secret: secret.map(str::to_string),
        }
    }

    #[test]
    fn test_derive_without_secret_omits_commitment() {
        let out = derive(&args(None, ProofType::Whale), &CliConfig::default()).unwrap();
        assert!(out.commitment.is_none());
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("commitment").is_none());
        assert_eq!(json["proof_type"], "whale");
    }

    #[test]
    fn test_nullifier_depends_on_proof_type() {
        let config = CliConfig::default();
        let whale = derive(&args(None, ProofType::Whale), &config).unwrap();
        let dev = derive(&args(None, ProofType::Developer), &config).unwrap();
        assert_eq!(whale.wallet_id, dev.wallet_id);
        assert_ne!(whale.nullifier, dev.nullifier);
        assert_ne!(whale.nullifier_record, dev.nullifier_record);
    }

    #[test]
    fn test_commitment_from_secret() {
        let secret = "ab".repeat(32);
        let out = derive(&args(Some(&secret), ProofType::Whale), &CliConfig::default()).unwrap();
        let expected = derive_commitment(&out.wallet_id, &[0xab; 32]);
        assert_eq!(out.commitment, Some(expected));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(derive(&args(Some("abcd"), ProofType::Whale), &CliConfig::default()).is_err());
    }
}
