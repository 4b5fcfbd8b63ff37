//! # Transactions
//!
//! An ordered list of instructions executed atomically, tied to a recent
//! blockhash and a fee payer. A transaction is signed over
//! [`Transaction::message_bytes`]; the first signature identifies it.
//!
//! `message_bytes` is a compact deterministic encoding owned by this crate.
//! Wallet adapters that speak the ledger's native serialization sign their
//! own encoding and return the result through [`crate::TransactionSigner`].

use std::fmt;

use serde::{Deserialize, Serialize};
use vouch_attestation::{Address, Instruction};
use vouch_crypto::{Ed25519PublicKey, Ed25519Signature};

/// Commitment level a confirmation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    /// Seen by the connected node.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted.
    Finalized,
}

impl fmt::Display for CommitmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        })
    }
}

impl std::str::FromStr for CommitmentLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown commitment level: {other}")),
        }
    }
}

/// A recent blockhash, base58 on display.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blockhash(pub [u8; 32]);

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({self})")
    }
}

/// Unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Fee payer; always a required signer.
    pub payer: Address,
    /// Blockhash bounding the transaction's validity.
    pub recent_blockhash: Blockhash,
    /// Instructions, executed in order, all or nothing.
    pub instructions: Vec<Instruction>,
}

impl Transaction {
    /// Assemble a transaction.
    pub fn new(payer: Address, recent_blockhash: Blockhash, instructions: Vec<Instruction>) -> Self {
        Self {
            payer,
            recent_blockhash,
            instructions,
        }
    }

    /// Every address that must sign: the payer first, then instruction
    /// signers in order of appearance, deduplicated.
    pub fn required_signers(&self) -> Vec<Address> {
        let mut signers = vec![self.payer];
        for meta in self.instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }

    /// Bytes covered by signatures.
    ///
    /// ```text
    /// blockhash(32) ‖ payer(32) ‖ ix_count(u16 le)
    ///   per ix: program(32) ‖ account_count(u16 le)
    ///           ‖ (pubkey(32) ‖ flags(1))* ‖ data_len(u32 le) ‖ data
    /// ```
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.recent_blockhash.0);
        out.extend_from_slice(self.payer.as_bytes());
        out.extend_from_slice(&(self.instructions.len() as u16).to_le_bytes());
        for ix in &self.instructions {
            out.extend_from_slice(ix.program_id.as_bytes());
            out.extend_from_slice(&(ix.accounts.len() as u16).to_le_bytes());
            for meta in &ix.accounts {
                out.extend_from_slice(meta.pubkey.as_bytes());
                out.push(u8::from(meta.is_signer) | (u8::from(meta.is_writable) << 1));
            }
            out.extend_from_slice(&(ix.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

/// Transaction id: the first signature, base58 on display.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxSignature(pub Ed25519Signature);

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0.as_bytes()).into_string())
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.to_string();
        write!(f, "TxSignature({}...)", &full[..full.len().min(12)])
    }
}

/// Transaction plus the signatures of its required signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The signed transaction.
    pub transaction: Transaction,
    /// `(signer, signature)` pairs, payer first.
    pub signatures: Vec<(Address, Ed25519Signature)>,
}

impl SignedTransaction {
    /// Transaction id, if any signature is present.
    pub fn id(&self) -> Option<TxSignature> {
        self.signatures.first().map(|(_, sig)| TxSignature(*sig))
    }

    /// Signature recorded for `signer`.
    pub fn signature_of(&self, signer: &Address) -> Option<&Ed25519Signature> {
        self.signatures
            .iter()
            .find(|(addr, _)| addr == signer)
            .map(|(_, sig)| sig)
    }

    /// First required signer whose signature is missing or invalid.
    pub fn first_invalid_signer(&self) -> Option<Address> {
        let message = self.transaction.message_bytes();
        self.transaction.required_signers().into_iter().find(|signer| {
            match self.signature_of(signer) {
                Some(sig) => vouch_crypto::verify_with_public_key(
                    &message,
                    sig,
                    &Ed25519PublicKey::from_bytes(signer.0),
                )
                .is_err(),
                None => true,
            }
        })
    }
}
