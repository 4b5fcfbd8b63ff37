//! # Commitment Engine
//!
//! Deterministic, domain-separated derivations:
//!
//! ```text
//! wallet_id  = SHA-256(address bytes)
//! commitment = SHA-256(wallet_id ‖ secret)
//! nullifier  = SHA-256(wallet_id ‖ pad32(domain))
//! ```
//!
//! ## Security Invariant
//!
//! All functions are total over fixed-size inputs and perform no I/O. The
//! only random value in the protocol is the caller-supplied `secret`, which
//! must come from a CSPRNG; see [`crate::IdentitySecret`]. Nullifier
//! uniqueness on-chain is enforced by the ledger, not by this module.

use vouch_core::{Commitment, Nullifier, ProofType, WalletId};

use crate::sha256::{sha256, sha256_concat};

/// Hash a wallet's public address into its 32-byte id.
pub fn derive_wallet_id(address: &str) -> WalletId {
    WalletId(sha256(address.as_bytes()))
}

/// Bind a secret to a wallet: `SHA-256(wallet_id ‖ secret)`.
pub fn derive_commitment(wallet_id: &WalletId, secret: &[u8; 32]) -> Commitment {
    Commitment(sha256_concat(&[wallet_id.as_bytes(), secret]))
}

/// Per-(wallet, domain) nullifier: `SHA-256(wallet_id ‖ pad32(domain))`.
pub fn derive_nullifier(wallet_id: &WalletId, domain: &str) -> Nullifier {
    Nullifier(sha256_concat(&[wallet_id.as_bytes(), &pad32(domain)]))
}

/// Nullifier for a credential type, using its registered domain separator.
pub fn nullifier_for(wallet_id: &WalletId, proof_type: ProofType) -> Nullifier {
    let nullifier = derive_nullifier(wallet_id, proof_type.domain());
    tracing::debug!(%proof_type, nullifier = %nullifier.short(), "derived nullifier");
    nullifier
}

/// Copy the UTF-8 bytes of `domain` into a zeroed 32-byte slot. Longer
/// domains are truncated.
pub fn pad32(domain: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = domain.as_bytes();
    let n = bytes.len().min(32);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad32_zero_pads_short_domain() {
        let padded = pad32("vouch_dev");
        assert_eq!(&padded[..9], b"vouch_dev");
        assert!(padded[9..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_pad32_truncates_long_domain() {
        let long = "a".repeat(40);
        assert_eq!(pad32(&long), [b'a'; 32]);
    }

    #[test]
    fn test_pad32_exact_32() {
        let exact = "b".repeat(32);
        assert_eq!(pad32(&exact), [b'b'; 32]);
    }

    #[test]
    fn test_wallet_id_is_sha256_of_address() {
        let id = derive_wallet_id("");
        assert_eq!(
            id.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_nullifier_domains_differ() {
        let w = derive_wallet_id("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU");
        let dev = nullifier_for(&w, ProofType::Developer);
        let whale = nullifier_for(&w, ProofType::Whale);
        assert_ne!(dev, whale);
        assert_eq!(dev, derive_nullifier(&w, "vouch_dev"));
    }

    #[test]
    fn test_nullifier_deterministic() {
        let w = WalletId([9u8; 32]);
        assert_eq!(derive_nullifier(&w, "vouch_dev"), derive_nullifier(&w, "vouch_dev"));
    }

    #[test]
    fn test_commitment_changes_with_secret() {
        let w = WalletId([1u8; 32]);
        let a = derive_commitment(&w, &[0u8; 32]);
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let b = derive_commitment(&w, &secret);
        assert_ne!(a, b);
    }

    #[test]
    fn test_commitment_preimage_order() {
        let w = WalletId([1u8; 32]);
        let secret = [2u8; 32];
        let expected = sha256_concat(&[&[1u8; 32], &[2u8; 32]]);
        assert_eq!(derive_commitment(&w, &secret).0, expected);
    }
}
