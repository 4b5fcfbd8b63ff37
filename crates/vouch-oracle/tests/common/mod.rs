//! Shared fixture: a funded payer, an in-memory ledger with one authorized
//! verifier, and envelopes whose public inputs bind a known nullifier.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vouch_attestation::Address;
use vouch_core::{Clock, DataHash, ManualClock, ProofType, WalletId};
use vouch_crypto::{nullifier_for, Ed25519KeyPair, IdentitySecret};
use vouch_ledger::{
    Blockhash, CommitmentLevel, InMemoryLedger, KeypairSigner, LedgerClient, LedgerError,
    LedgerParams, SignedTransaction, TransactionSigner, TxSignature,
};
use vouch_oracle::{OracleConfig, RetryPolicy};
use vouch_zkp::{compute_expiration, ProofEnvelope, PublicInputs};

pub const START_MS: u64 = 1_700_000_000_000;
pub const ADMIN: Address = Address([0xad; 32]);

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
    pub verifier: Ed25519KeyPair,
    pub payer: Arc<KeypairSigner>,
    pub recipient: Address,
}

pub fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(START_MS));
    let ledger = InMemoryLedger::new(
        Address::VOUCH_PROGRAM,
        ADMIN,
        LedgerParams::default(),
        clock.clone(),
    )
    .unwrap();
    let verifier = Ed25519KeyPair::from_seed(&[0x42; 32]);
    ledger.add_verifier(&ADMIN, verifier.public_key()).unwrap();
    let payer = KeypairSigner::new(Ed25519KeyPair::from_seed(&[0x07; 32]));
    ledger.airdrop(&payer.address(), 1_000_000_000);
    Fixture {
        clock,
        ledger: Arc::new(ledger),
        verifier,
        payer: Arc::new(payer),
        recipient: Address([0x99; 32]),
    }
}

pub fn fast_config(base_url: &str) -> OracleConfig {
    let mut config = OracleConfig::new(base_url);
    config.timeout_secs = 2;
    config.retry = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
    };
    config
}

pub fn identity(seed: u8) -> IdentitySecret {
    IdentitySecret::from_parts(WalletId([seed; 32]), [seed.wrapping_add(1); 32])
}

/// Envelope for `identity(seed)` whose public inputs follow the circuit
/// layout.
pub fn envelope(seed: u8, proof_type: ProofType, clock: &dyn Clock) -> ProofEnvelope {
    let secret = identity(seed);
    let nullifier = nullifier_for(secret.wallet_id(), proof_type);
    let commitment = secret.commitment();
    let data_hash = DataHash([seed ^ 0x5a; 32]);
    let epoch = clock.now_ms() / 1000 / 86_400;
    let inputs = PublicInputs {
        nullifier,
        commitment,
        data_hash,
        threshold: 10,
        epoch,
    }
    .encode();
    ProofEnvelope::new(
        vec![0xab; 256],
        inputs,
        &nullifier,
        &commitment,
        epoch,
        &data_hash,
        compute_expiration(clock, None),
    )
}

/// Ledger that misreports once, to reproduce what a real RPC node can do.
pub struct FlakyLedger {
    pub inner: Arc<InMemoryLedger>,
    /// Land the next transaction, then report a confirmation timeout.
    pub time_out_after_landing: AtomicBool,
    /// Report this address as absent on the next lookup.
    pub hide_once: parking_lot::Mutex<Option<Address>>,
}

impl FlakyLedger {
    pub fn new(inner: Arc<InMemoryLedger>) -> Self {
        Self {
            inner,
            time_out_after_landing: AtomicBool::new(false),
            hide_once: parking_lot::Mutex::new(None),
        }
    }
}

#[async_trait]
impl LedgerClient for FlakyLedger {
    async fn account_exists(&self, address: &Address) -> Result<bool, LedgerError> {
        {
            let mut hidden = self.hide_once.lock();
            if hidden.as_ref() == Some(address) {
                *hidden = None;
                return Ok(false);
            }
        }
        self.inner.account_exists(address).await
    }

    async fn latest_blockhash(&self) -> Result<Blockhash, LedgerError> {
        self.inner.latest_blockhash().await
    }

    async fn send_and_confirm(
        &self,
        transaction: &SignedTransaction,
        commitment: CommitmentLevel,
        cancel: &CancellationToken,
    ) -> Result<TxSignature, LedgerError> {
        let id = self.inner.send_and_confirm(transaction, commitment, cancel).await?;
        if self.time_out_after_landing.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::ConfirmationTimeout { commitment });
        }
        Ok(id)
    }

    async fn is_confirmed(&self, signature: &TxSignature) -> Result<bool, LedgerError> {
        self.inner.is_confirmed(signature).await
    }
}
