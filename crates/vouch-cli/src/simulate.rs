//! `vouch simulate`: one prove flow against an in-memory ledger, a local
//! signing oracle, and the mock prover and mixer.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vouch_attestation::Address;
use vouch_core::{Clock, ProofType, SystemClock};
use vouch_crypto::{derive_wallet_id, Ed25519KeyPair, IdentitySecret};
use vouch_flow::{progress_channel, FlowOutcome, FlowRequest, FlowStage, MockMixer, ProveFlow};
use vouch_ledger::{InMemoryLedger, KeypairSigner, TransactionSigner};
use vouch_oracle::{AttestationSubmitter, LocalOracle};
use vouch_zkp::{
    CircuitLoader, CredentialData, MockCircuitSource, MockProofGenerator, VerificationLevel,
};

use crate::{print_json, runtime, CliConfig};

/// Lamports credited to the simulated fee payer.
const PAYER_FUNDS: u64 = 1_000_000_000;

/// Arguments for `vouch simulate`.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Credential type to prove.
    #[arg(long, default_value = "whale")]
    pub proof_type: ProofType,
    /// Volume (whale) or TVL (developer), in USD.
    #[arg(long)]
    pub metric: u64,
    /// Trade count (whale) or program count (developer).
    #[arg(long, default_value_t = 42)]
    pub count: u32,
    /// Minimum the metric must reach.
    #[arg(long)]
    pub threshold: u64,
    /// Wallet receiving the credential; defaults to the proving wallet.
    #[arg(long)]
    pub recipient: Option<Address>,
    /// Route funds through the mixer.
    #[arg(long)]
    pub privacy: bool,
    /// Simulate an unhealthy oracle.
    #[arg(long)]
    pub oracle_down: bool,
    /// Accept a format-only check when the oracle is down.
    #[arg(long)]
    pub allow_format_only: bool,
}

/// Result printed by `vouch simulate`.
#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    /// Proving wallet.
    pub wallet: Address,
    /// Whether the run succeeded.
    pub success: bool,
    /// Attested, but the withdrawal hop failed.
    pub partial: bool,
    /// Stage the run ended in.
    pub final_stage: FlowStage,
    /// Stage in progress when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<FlowStage>,
    /// Failure category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether retrying the same request could succeed.
    pub retryable: bool,
    /// Strength of the verification behind a success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_level: Option<VerificationLevel>,
    /// Funds went through the mixer.
    pub privacy_used: bool,
    /// Recorded transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_signature: Option<String>,
    /// Nullifier of the submitted proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullifier: Option<String>,
    /// Mixer shield transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shield_tx: Option<String>,
    /// Mixer unshield transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdraw_tx: Option<String>,
    /// Stages visited, in order.
    pub stages: Vec<FlowStage>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

impl SimulationSummary {
    fn from_outcome(wallet: Address, outcome: &FlowOutcome) -> Self {
        let artifacts = &outcome.artifacts;
        Self {
            wallet,
            success: outcome.success,
            partial: outcome.partial,
            final_stage: outcome.final_stage(),
            failed_stage: outcome.failed_stage,
            error_kind: outcome.error.as_ref().map(|e| e.kind()),
            error: outcome.error.as_ref().map(|e| e.to_string()),
            retryable: outcome.error.as_ref().is_some_and(|e| e.is_retryable()),
            verification_level: outcome.verification_level,
            privacy_used: outcome.privacy_used,
            tx_signature: outcome.tx_signature().map(|s| s.to_string()),
            nullifier: artifacts.envelope.as_ref().map(|e| e.nullifier.clone()),
            shield_tx: artifacts.shield_tx.clone(),
            withdraw_tx: artifacts.withdraw_tx.clone(),
            stages: std::iter::once(FlowStage::Idle)
                .chain(outcome.stage_log.iter().map(|t| t.to))
                .collect(),
            warnings: outcome.warnings.clone(),
        }
    }
}

fn credential(args: &SimulateArgs) -> CredentialData {
    match args.proof_type {
        ProofType::Developer => CredentialData::Developer {
            program_count: args.count,
            total_tvl: args.metric,
        },
        ProofType::Whale => CredentialData::Whale {
            trade_count: args.count,
            total_volume: args.metric,
        },
    }
}

/// Wire up the in-memory collaborators and run one flow.
pub async fn simulate(
    args: &SimulateArgs,
    config: &CliConfig,
    cancel: &CancellationToken,
) -> Result<SimulationSummary> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut flow_config = config.flow.clone();
    flow_config.use_privacy = args.privacy;
    flow_config.require_privacy &= args.privacy;
    flow_config.allow_format_only_fallback |= args.allow_format_only;
    flow_config.validate()?;

    let admin = Address::from(Ed25519KeyPair::generate().public_key());
    let ledger = InMemoryLedger::new(
        config.oracle.program_id,
        admin,
        config.ledger.clone(),
        clock.clone(),
    )?;

    let source = Arc::new(MockCircuitSource::new());
    let prover = Arc::new(MockProofGenerator::new());
    let loader = Arc::new(CircuitLoader::new(source, clock.clone()));
    let oracle = LocalOracle::new(Ed25519KeyPair::generate())
        .with_proof_check(prover.clone(), loader.clone());
    ledger
        .add_verifier(&admin, oracle.public_key())
        .context("authorizing the simulated verifier")?;
    oracle.set_healthy(!args.oracle_down);

    let payer = KeypairSigner::new(Ed25519KeyPair::generate());
    ledger.airdrop(&payer.address(), PAYER_FUNDS);

    let mut oracle_config = config.oracle.clone();
    oracle_config.verifier_pubkey = Some(oracle.public_key());
    let submitter = AttestationSubmitter::new(
        Arc::new(oracle),
        Arc::new(ledger),
        Arc::new(payer),
        clock.clone(),
        oracle_config,
    );
    let flow = ProveFlow::new(loader, prover, Arc::new(submitter), clock, flow_config)
        .with_mixer(Arc::new(MockMixer::new()));

    let wallet = Address::from(Ed25519KeyPair::generate().public_key());
    let request = FlowRequest {
        identity: IdentitySecret::generate(derive_wallet_id(&wallet.to_base58())),
        credential: credential(args),
        threshold: args.threshold,
        wallet,
        recipient: args.recipient,
    };
    tracing::info!(%wallet, proof_type = %args.proof_type, privacy = args.privacy, "simulating");

    let (reporter, mut events) = progress_channel(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::info!(stage = %event.stage, percent = event.percent, "{}", event.message);
        }
    });
    let outcome = flow.run(request, cancel, &reporter).await;
    drop(reporter);
    let _ = printer.await;

    let summary = SimulationSummary::from_outcome(wallet, &outcome);
    outcome.cleanup.run();
    Ok(summary)
}

/// Execute `vouch simulate`. Ctrl-C cancels the run; exit code 1 on failure.
pub fn run_simulate(args: &SimulateArgs, config: &CliConfig) -> Result<u8> {
    let summary = runtime()?.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                on_signal.cancel();
            }
        });
        let summary = simulate(args, config, &cancel).await;
        watcher.abort();
        summary
    })?;
    print_json(&summary)?;
    Ok(if summary.success { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_oracle::RetryPolicy;

    fn args(metric: u64, threshold: u64) -> SimulateArgs {
        SimulateArgs {
            proof_type: ProofType::Whale,
            metric,
            count: 42,
            threshold,
            recipient: None,
            privacy: false,
            oracle_down: false,
            allow_format_only: false,
        }
    }

    fn config() -> CliConfig {
        let mut config = CliConfig::default();
        config.oracle.retry = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
        };
        config
    }

    #[tokio::test]
    async fn test_direct_run_records() {
        let cancel = CancellationToken::new();
        let summary = simulate(&args(60_000, 50_000), &config(), &cancel).await.unwrap();
        assert!(summary.success, "{summary:?}");
        assert_eq!(summary.final_stage, FlowStage::Complete);
        assert_eq!(summary.verification_level, Some(VerificationLevel::Cryptographic));
        assert!(summary.tx_signature.is_some());
        assert!(!summary.privacy_used);
    }

    #[tokio::test]
    async fn test_below_threshold_fails_at_idle() {
        let cancel = CancellationToken::new();
        let summary = simulate(&args(40_000, 50_000), &config(), &cancel).await.unwrap();
        assert!(!summary.success);
        assert_eq!(summary.failed_stage, Some(FlowStage::Idle));
        assert_eq!(summary.error_kind, Some("threshold_not_met"));
        assert!(!summary.retryable);
    }

    #[tokio::test]
    async fn test_privacy_with_recipient_withdraws() {
        let mut a = args(60_000, 50_000);
        a.privacy = true;
        a.recipient = Some(Address([0x99; 32]));
        let cancel = CancellationToken::new();
        let summary = simulate(&a, &config(), &cancel).await.unwrap();
        assert!(summary.success, "{summary:?}");
        assert!(summary.privacy_used);
        assert!(summary.shield_tx.is_some());
        assert!(summary.withdraw_tx.is_some());
        assert!(summary.stages.contains(&FlowStage::Withdrawing));
    }

    #[tokio::test]
    async fn test_oracle_down_format_only() {
        let mut a = args(60_000, 50_000);
        a.oracle_down = true;
        a.allow_format_only = true;
        let cancel = CancellationToken::new();
        let summary = simulate(&a, &config(), &cancel).await.unwrap();
        assert!(summary.success, "{summary:?}");
        assert_eq!(summary.verification_level, Some(VerificationLevel::FormatOnly));
        assert!(summary.tx_signature.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["verification_level"], "format_only");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut a = args(60_000, 50_000);
        a.privacy = true;
        let summary = simulate(&a, &config(), &cancel).await.unwrap();
        assert!(!summary.success);
        assert_eq!(summary.error_kind, Some("cancelled"));
    }
}
