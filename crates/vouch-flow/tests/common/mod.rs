//! Shared harness: in-memory ledger, local signing oracle, mock prover and
//! mock mixer, all on one manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use vouch_attestation::Address;
use vouch_core::ManualClock;
use vouch_crypto::{derive_wallet_id, Ed25519KeyPair, IdentitySecret};
use vouch_flow::{FlowConfig, FlowRequest, MockMixer, ProveFlow};
use vouch_ledger::{InMemoryLedger, KeypairSigner, LedgerParams, TransactionSigner};
use vouch_oracle::{AttestationSubmitter, LocalOracle, OracleConfig, RetryPolicy};
use vouch_zkp::{CircuitLoader, CredentialData, MockCircuitSource, MockProofGenerator, ProofCache};

pub const START_MS: u64 = 1_700_000_000_000;
pub const ADMIN: Address = Address([0xad; 32]);

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
    pub oracle: Arc<LocalOracle>,
    pub prover: Arc<MockProofGenerator>,
    pub source: Arc<MockCircuitSource>,
    pub mixer: Arc<MockMixer>,
    pub payer: Arc<KeypairSigner>,
}

pub fn harness() -> Harness {
    harness_with(MockProofGenerator::new(), MockMixer::new())
}

pub fn harness_with(prover: MockProofGenerator, mixer: MockMixer) -> Harness {
    let clock = Arc::new(ManualClock::new(START_MS));
    let ledger = InMemoryLedger::new(
        Address::VOUCH_PROGRAM,
        ADMIN,
        LedgerParams::default(),
        clock.clone(),
    )
    .unwrap();
    let oracle = LocalOracle::new(Ed25519KeyPair::from_seed(&[0x42; 32]));
    ledger.add_verifier(&ADMIN, oracle.public_key()).unwrap();
    let payer = KeypairSigner::new(Ed25519KeyPair::from_seed(&[0x07; 32]));
    ledger.airdrop(&payer.address(), 1_000_000_000);
    Harness {
        clock,
        ledger: Arc::new(ledger),
        oracle: Arc::new(oracle),
        prover: Arc::new(prover),
        source: Arc::new(MockCircuitSource::new()),
        mixer: Arc::new(mixer),
        payer: Arc::new(payer),
    }
}

pub fn oracle_config() -> OracleConfig {
    let mut config = OracleConfig::default();
    config.retry = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
    };
    config
}

/// Direct flow: no mixer traffic unless the test enables privacy.
pub fn direct() -> FlowConfig {
    FlowConfig {
        use_privacy: false,
        ..FlowConfig::default()
    }
}

pub fn flow(h: &Harness, config: FlowConfig) -> ProveFlow {
    let loader = Arc::new(CircuitLoader::new(h.source.clone(), h.clock.clone()));
    let submitter = AttestationSubmitter::new(
        h.oracle.clone(),
        h.ledger.clone(),
        h.payer.clone(),
        h.clock.clone(),
        oracle_config(),
    );
    ProveFlow::new(
        loader,
        h.prover.clone(),
        Arc::new(submitter),
        h.clock.clone(),
        config,
    )
    .with_mixer(h.mixer.clone())
}

pub fn cached_flow(h: &Harness, config: FlowConfig, cache: Arc<ProofCache>) -> ProveFlow {
    flow(h, config).with_cache(cache)
}

pub fn wallet(seed: u8) -> Address {
    Address([seed; 32])
}

/// Whale credential request for `wallet(seed)` with a fresh secret.
pub fn request(seed: u8, total_volume: u64, threshold: u64, recipient: Option<Address>) -> FlowRequest {
    let wallet = wallet(seed);
    FlowRequest {
        identity: IdentitySecret::generate(derive_wallet_id(&wallet.to_base58())),
        credential: CredentialData::Whale {
            trade_count: 42,
            total_volume,
        },
        threshold,
        wallet,
        recipient,
    }
}
