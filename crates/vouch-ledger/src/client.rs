//! # Ledger Client Interface
//!
//! The read/write contract the oracle client depends on. Implementations
//! wrap an RPC endpoint or, in tests and the simulator, the
//! [`crate::InMemoryLedger`].
//!
//! Every suspending call observes the caller's [`CancellationToken`] and
//! returns [`LedgerError::Cancelled`] promptly when it fires.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vouch_attestation::Address;
use vouch_crypto::Ed25519KeyPair;

use crate::error::LedgerError;
use crate::transaction::{
    Blockhash, CommitmentLevel, SignedTransaction, Transaction, TxSignature,
};

/// Point-in-time ledger reads and transaction submission.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Whether an account exists at `address`.
    async fn account_exists(&self, address: &Address) -> Result<bool, LedgerError>;

    /// A blockhash fresh enough to build a transaction against.
    async fn latest_blockhash(&self) -> Result<Blockhash, LedgerError>;

    /// Broadcast and wait for `commitment`.
    async fn send_and_confirm(
        &self,
        transaction: &SignedTransaction,
        commitment: CommitmentLevel,
        cancel: &CancellationToken,
    ) -> Result<TxSignature, LedgerError>;

    /// Whether the transaction identified by `signature` has landed.
    async fn is_confirmed(&self, signature: &TxSignature) -> Result<bool, LedgerError>;
}

/// Opaque wallet signing.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Address of the signing wallet. Used as fee payer.
    fn address(&self) -> Address;

    /// Sign `transaction`. The wallet may refuse.
    async fn sign(&self, transaction: Transaction) -> Result<SignedTransaction, LedgerError>;
}

/// Signer backed by a local Ed25519 key pair.
#[derive(Debug)]
pub struct KeypairSigner {
    keypair: Ed25519KeyPair,
}

impl KeypairSigner {
    /// Wrap `keypair`.
    pub fn new(keypair: Ed25519KeyPair) -> Self {
        Self { keypair }
    }

    /// Fresh random signer.
    pub fn generate() -> Self {
        Self::new(Ed25519KeyPair::generate())
    }
}

#[async_trait]
impl TransactionSigner for KeypairSigner {
    fn address(&self) -> Address {
        Address::from(self.keypair.public_key())
    }

    async fn sign(&self, transaction: Transaction) -> Result<SignedTransaction, LedgerError> {
        let own = self.address();
        if let Some(other) = transaction
            .required_signers()
            .into_iter()
            .find(|signer| *signer != own)
        {
            return Err(LedgerError::Signing(format!(
                "transaction requires a signature from {other}, which this wallet does not hold"
            )));
        }
        let signature = self.keypair.sign(&transaction.message_bytes());
        Ok(SignedTransaction {
            transaction,
            signatures: vec![(own, signature)],
        })
    }
}
