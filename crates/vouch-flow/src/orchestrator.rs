//! # Prove-Flow Orchestrator
//!
//! Drives one credential attempt from private inputs to an on-ledger
//! attestation:
//!
//! 1. Threshold precheck. Fails before any external call.
//! 2. Shield funds through the privacy mixer when requested and available.
//!    Failure degrades to a warning unless privacy is mandatory.
//! 3. Reuse a cached envelope or load the circuit and generate a proof.
//! 4. Validate the envelope and submit it to the oracle and ledger.
//! 5. Withdraw shielded funds to a distinct recipient. Failure is reported
//!    as partial success; the attestation is already recorded.
//!
//! Every external await runs under [`guarded`]: the caller's cancellation
//! token, the overall deadline and the stage's own cap all abort it.
//!
//! ## Security Invariant
//!
//! The identity secret is scrubbed as soon as the proof exists, and the
//! [`CleanupHandle`] is run on every error path before the outcome is
//! returned. Whatever it still holds on success is scrubbed when the
//! caller runs or drops it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vouch_attestation::Address;
use vouch_core::{hex, Clock, ValidationError, WalletId};
use vouch_crypto::{derive_wallet_id, IdentitySecret};
use vouch_oracle::{AttestationSubmitter, Submission, SubmitRequest};
use vouch_zkp::{
    compute_expiration, current_epoch, validate, CacheKey, CircuitLoader, CredentialData,
    PrivateInputs, ProofCache, ProofEnvelope, ProofGenerator, ProverError, VerificationLevel,
};

use crate::cleanup::CleanupHandle;
use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::mixer::{MixerError, PrivacyMixer};
use crate::progress::ProgressReporter;
use crate::stage::{FlowStage, StageMachine, StageTransition};

/// Caller inputs for one run. The identity secret is moved in and never
/// handed back.
#[derive(Debug)]
pub struct FlowRequest {
    /// Secret behind the commitment.
    pub identity: IdentitySecret,
    /// Credential facts to prove.
    pub credential: CredentialData,
    /// Minimum the credential metric must reach.
    pub threshold: u64,
    /// Wallet the identity belongs to.
    pub wallet: Address,
    /// Wallet receiving the credential. Defaults to `wallet`.
    pub recipient: Option<Address>,
}

/// Everything produced before the run ended.
#[derive(Debug, Default)]
pub struct FlowArtifacts {
    /// Mixer shield transaction.
    pub shield_tx: Option<String>,
    /// Envelope that was submitted.
    pub envelope: Option<ProofEnvelope>,
    /// Whether the envelope came from the proof cache.
    pub proof_from_cache: bool,
    /// Oracle and ledger result.
    pub submission: Option<Submission>,
    /// Mixer unshield transaction.
    pub withdraw_tx: Option<String>,
}

/// Structured result of a run. Always returned, success or not.
#[derive(Debug)]
pub struct FlowOutcome {
    /// The credential was attested (or format-checked, if allowed).
    pub success: bool,
    /// Stage that was in progress when the run failed.
    pub failed_stage: Option<FlowStage>,
    /// Why the run failed.
    pub error: Option<FlowError>,
    /// Ordered stage transitions.
    pub stage_log: Vec<StageTransition>,
    /// Transactions and proofs produced so far.
    pub artifacts: FlowArtifacts,
    /// Non-fatal problems, such as degraded privacy.
    pub warnings: Vec<String>,
    /// Strength of the verification behind a successful run.
    pub verification_level: Option<VerificationLevel>,
    /// Funds went through the mixer.
    pub privacy_used: bool,
    /// Attested, but the withdrawal hop did not complete.
    pub partial: bool,
    /// Scrubs remaining secret material. Fires on drop if not run.
    pub cleanup: CleanupHandle,
}

impl FlowOutcome {
    /// Stage the run ended in.
    pub fn final_stage(&self) -> FlowStage {
        self.stage_log.last().map_or(FlowStage::Idle, |t| t.to)
    }

    /// Recorded transaction, if the attestation reached the ledger.
    pub fn tx_signature(&self) -> Option<vouch_ledger::TxSignature> {
        self.artifacts
            .submission
            .as_ref()
            .and_then(Submission::recorded)
            .map(|r| r.tx_signature)
    }
}

// ─── Guarded awaits ──────────────────────────────────────────────────

/// Await `fut` unless the run is cancelled, the overall deadline passes, or
/// the stage cap of `limit_secs` runs out first.
async fn guarded<T, E, F>(
    stage: FlowStage,
    limit_secs: u64,
    deadline: Instant,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, FlowError>
where
    F: Future<Output = Result<T, E>>,
    FlowError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FlowError::Cancelled { stage }),
        _ = tokio::time::sleep_until(deadline) => Err(FlowError::DeadlineExceeded { stage }),
        _ = tokio::time::sleep(Duration::from_secs(limit_secs)) => {
            Err(FlowError::StageTimedOut { stage, limit_secs })
        }
        result = fut => result.map_err(FlowError::from),
    }
}

// ─── Run state ───────────────────────────────────────────────────────

struct Run<'a> {
    machine: StageMachine,
    artifacts: FlowArtifacts,
    warnings: Vec<String>,
    level: Option<VerificationLevel>,
    privacy_used: bool,
    partial: bool,
    cleanup: CleanupHandle,
    progress: &'a ProgressReporter,
    cancel: CancellationToken,
    deadline: Instant,
}

impl Run<'_> {
    fn advance(&mut self, to: FlowStage, note: impl Into<String>) -> Result<(), FlowError> {
        let note = note.into();
        self.machine.advance(to, note.clone())?;
        self.progress.emit(to, note);
        Ok(())
    }

    fn warn(&mut self, message: String) {
        let stage = self.machine.stage();
        tracing::warn!(%stage, "{message}");
        self.progress.emit(stage, message.clone());
        self.warnings.push(message);
    }
}

// ─── Orchestrator ────────────────────────────────────────────────────

/// Runs prove flows against one set of collaborators.
pub struct ProveFlow {
    loader: Arc<CircuitLoader>,
    prover: Arc<dyn ProofGenerator>,
    submitter: Arc<AttestationSubmitter>,
    clock: Arc<dyn Clock>,
    config: FlowConfig,
    mixer: Option<Arc<dyn PrivacyMixer>>,
    cache: Option<Arc<ProofCache>>,
}

impl std::fmt::Debug for ProveFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProveFlow")
            .field("config", &self.config)
            .field("mixer", &self.mixer.is_some())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ProveFlow {
    /// Orchestrator without a mixer or proof cache.
    pub fn new(
        loader: Arc<CircuitLoader>,
        prover: Arc<dyn ProofGenerator>,
        submitter: Arc<AttestationSubmitter>,
        clock: Arc<dyn Clock>,
        config: FlowConfig,
    ) -> Self {
        Self {
            loader,
            prover,
            submitter,
            clock,
            config,
            mixer: None,
            cache: None,
        }
    }

    /// Route funds through `mixer` when privacy is enabled.
    pub fn with_mixer(mut self, mixer: Arc<dyn PrivacyMixer>) -> Self {
        self.mixer = Some(mixer);
        self
    }

    /// Reuse and store envelopes in `cache`.
    pub fn with_cache(mut self, cache: Arc<ProofCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Run one attempt. Never panics and never returns early without an
    /// outcome; inspect [`FlowOutcome::success`].
    pub async fn run(
        &self,
        request: FlowRequest,
        cancel: &CancellationToken,
        progress: &ProgressReporter,
    ) -> FlowOutcome {
        let FlowRequest {
            identity,
            credential,
            threshold,
            wallet,
            recipient,
        } = request;
        tracing::info!(
            proof_type = %credential.proof_type(),
            threshold,
            network = %self.config.network,
            "starting prove flow"
        );

        let mut run = Run {
            machine: StageMachine::new(Arc::clone(&self.clock)),
            artifacts: FlowArtifacts::default(),
            warnings: Vec::new(),
            level: None,
            privacy_used: false,
            partial: false,
            cleanup: CleanupHandle::new(identity),
            progress,
            cancel: cancel.child_token(),
            deadline: Instant::now() + Duration::from_secs(self.config.overall_timeout_secs),
        };
        let result = self
            .drive(&mut run, &credential, threshold, wallet, recipient)
            .await;
        self.finish(run, result)
    }

    fn finish(&self, mut run: Run<'_>, result: Result<(), FlowError>) -> FlowOutcome {
        let (success, failed_stage, error) = match result {
            Ok(()) => (true, None, None),
            Err(err) => {
                let failed = run.machine.fail(err.to_string());
                run.cleanup.run();
                run.progress.emit(FlowStage::Error, err.to_string());
                (false, Some(failed), Some(err))
            }
        };

        let outcome: &'static str = match &error {
            Some(err) => err.kind(),
            None if run.partial => "partial",
            None if run.level == Some(VerificationLevel::FormatOnly) => "format_only",
            None => "success",
        };
        metrics::counter!("vouch_flow_runs_total", "outcome" => outcome).increment(1);
        tracing::info!(outcome, privacy = run.privacy_used, "prove flow finished");

        FlowOutcome {
            success,
            failed_stage,
            error,
            stage_log: run.machine.log().to_vec(),
            artifacts: run.artifacts,
            warnings: run.warnings,
            verification_level: run.level,
            privacy_used: run.privacy_used,
            partial: run.partial,
            cleanup: run.cleanup,
        }
    }

    async fn drive(
        &self,
        run: &mut Run<'_>,
        credential: &CredentialData,
        threshold: u64,
        wallet: Address,
        recipient: Option<Address>,
    ) -> Result<(), FlowError> {
        self.config.validate()?;
        let proof_type = credential.proof_type();
        if !credential.meets_threshold(threshold) {
            return Err(FlowError::ThresholdNotMet {
                proof_type,
                metric: credential.metric(),
                threshold,
            });
        }
        let wallet_id = derive_wallet_id(&wallet.to_base58());
        if run.cleanup.with_identity(|s| *s.wallet_id() == wallet_id) != Some(true) {
            return Err(ValidationError::MalformedField {
                field: "wallet",
                reason: "identity secret belongs to a different wallet".to_string(),
            }
            .into());
        }

        self.shield(run).await?;

        let note = if run.privacy_used {
            "generating proof from shielded identity"
        } else {
            "generating proof"
        };
        run.advance(FlowStage::GeneratingProof, note)?;
        let envelope = self.prove(run, &wallet_id, credential, threshold).await?;

        run.artifacts.envelope = Some(envelope.clone());
        run.advance(FlowStage::Submitting, "verifying proof with oracle")?;
        self.submit(run, &wallet_id, &envelope, credential, threshold, recipient.unwrap_or(wallet))
            .await?;

        self.withdraw(run, wallet, recipient).await?;
        run.advance(FlowStage::Complete, "credential attested")?;
        Ok(())
    }

    /// Stage 2. `Ok` covers both shielded and degraded-without-privacy.
    async fn shield(&self, run: &mut Run<'_>) -> Result<(), FlowError> {
        if !self.config.use_privacy {
            return Ok(());
        }
        let network = self.config.network;
        let mixer = match &self.mixer {
            Some(m) if m.is_available(network) => Arc::clone(m),
            _ => {
                let reason = format!("no privacy mixer available on {network}");
                if self.config.require_privacy {
                    return Err(MixerError::Unavailable(reason).into());
                }
                run.warn(format!("{reason}; continuing without privacy"));
                return Ok(());
            }
        };

        let amount = self.config.shield_amount;
        run.advance(FlowStage::Shielding, format!("shielding {amount} lamports"))?;
        let shielded = guarded(
            FlowStage::Shielding,
            self.config.shield_timeout_secs,
            run.deadline,
            &run.cancel,
            mixer.shield(amount),
        )
        .await;
        match shielded {
            Ok(receipt) => {
                tracing::info!(
                    tx = %receipt.tx_id,
                    ephemeral = %receipt.ephemeral.address(),
                    "funds shielded"
                );
                run.artifacts.shield_tx = Some(receipt.tx_id);
                run.cleanup.hold_ephemeral(receipt.ephemeral);
                run.privacy_used = true;
                Ok(())
            }
            Err(
                e @ (FlowError::Cancelled { .. } | FlowError::DeadlineExceeded { .. }),
            ) => Err(e),
            Err(e) if self.config.require_privacy => Err(e),
            Err(e) => {
                run.warn(format!("shielding failed, continuing without privacy: {e}"));
                Ok(())
            }
        }
    }

    /// Stage 3. Cached envelope or a fresh proof; the identity secret is
    /// scrubbed either way.
    async fn prove(
        &self,
        run: &mut Run<'_>,
        wallet_id: &WalletId,
        credential: &CredentialData,
        threshold: u64,
    ) -> Result<ProofEnvelope, FlowError> {
        let key = CacheKey::derive(wallet_id, credential.proof_type(), threshold);
        let cached = self.cache.as_ref().and_then(|c| c.get(&key));
        let envelope = match cached {
            Some(envelope) => {
                run.progress
                    .emit(FlowStage::GeneratingProof, "reusing cached proof");
                tracing::info!(key = %key.to_hex(), "proof cache hit");
                run.artifacts.proof_from_cache = true;
                envelope
            }
            None => {
                guarded(
                    FlowStage::GeneratingProof,
                    self.config.proof_timeout_secs,
                    run.deadline,
                    &run.cancel,
                    self.generate(&run.cleanup, credential, threshold),
                )
                .await?
            }
        };
        run.cleanup.scrub_identity();
        validate(&envelope, self.clock.as_ref())?;

        if !run.artifacts.proof_from_cache {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.put(&key, envelope.clone()) {
                    run.warn(format!("could not cache proof: {e}"));
                }
            }
        }
        Ok(envelope)
    }

    async fn generate(
        &self,
        cleanup: &CleanupHandle,
        credential: &CredentialData,
        threshold: u64,
    ) -> Result<ProofEnvelope, FlowError> {
        let proof_type = credential.proof_type();
        if !self.loader.is_available() {
            return Err(ProverError::CircuitUnavailable {
                circuit_id: proof_type.circuit_id().to_string(),
                reason: "proving engine not available in this environment".to_string(),
            }
            .into());
        }
        let circuit = self.loader.load(proof_type).await?;
        let epoch = current_epoch(self.clock.as_ref());
        let inputs = cleanup
            .with_identity(|identity| {
                PrivateInputs::new(identity, credential.clone(), threshold, epoch)
            })
            .ok_or_else(|| ProverError::Internal("identity secret already scrubbed".to_string()))?;

        let generated = self.prover.generate(&circuit, &inputs).await?;
        let public_inputs = generated
            .public_input_hexes
            .iter()
            .map(|h| hex::decode32("public_inputs", h))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            circuit = %circuit.id,
            proof_len = generated.proof.len(),
            public_inputs = public_inputs.len(),
            "proof generated"
        );
        Ok(ProofEnvelope::new(
            generated.proof,
            public_inputs,
            &inputs.nullifier(),
            &inputs.commitment(),
            epoch,
            &credential.data_hash(),
            compute_expiration(self.clock.as_ref(), self.config.envelope_ttl_ms),
        ))
    }

    /// Stage 4. A recorded or already-spent nullifier evicts the cached
    /// envelope; it can never be submitted again.
    async fn submit(
        &self,
        run: &mut Run<'_>,
        wallet_id: &WalletId,
        envelope: &ProofEnvelope,
        credential: &CredentialData,
        threshold: u64,
        recipient: Address,
    ) -> Result<(), FlowError> {
        let proof_type = credential.proof_type();
        let request = SubmitRequest {
            envelope,
            proof_type,
            recipient,
            allow_format_only: self.config.allow_format_only_fallback,
        };
        let result = guarded(
            FlowStage::Submitting,
            self.config.submit_timeout_secs,
            run.deadline,
            &run.cancel,
            self.submitter.submit(&request, &run.cancel),
        )
        .await;

        let spent = match &result {
            Ok(Submission::Recorded(_)) => true,
            Ok(Submission::FormatOnly(_)) => false,
            Err(e) => e.is_already_credentialed(),
        };
        if spent {
            if let Some(cache) = &self.cache {
                let key = CacheKey::derive(wallet_id, proof_type, threshold);
                if let Err(e) = cache.remove(&key) {
                    tracing::warn!("could not evict spent proof from cache: {e}");
                }
            }
        }

        let submission = result?;
        run.level = Some(submission.verification_level());
        if let Submission::FormatOnly(_) = submission {
            run.warn(
                "oracle unreachable; proof passed format checks only and was not recorded"
                    .to_string(),
            );
        }
        run.artifacts.submission = Some(submission);
        Ok(())
    }

    /// Stage 5. Only runs when funds were shielded and a distinct recipient
    /// was named.
    async fn withdraw(
        &self,
        run: &mut Run<'_>,
        wallet: Address,
        recipient: Option<Address>,
    ) -> Result<(), FlowError> {
        if !run.privacy_used {
            return Ok(());
        }
        let (Some(mixer), Some(recipient)) = (&self.mixer, recipient.filter(|r| *r != wallet))
        else {
            if let Some(address) = run.cleanup.ephemeral_address() {
                run.warn(format!(
                    "no distinct recipient; shielded funds remain at {address}"
                ));
            }
            return Ok(());
        };
        let Some(mut ephemeral) = run.cleanup.take_ephemeral() else {
            return Ok(());
        };

        run.advance(FlowStage::Withdrawing, format!("withdrawing to {recipient}"))?;
        let amount = self.config.shield_amount;
        let withdrawn = guarded(
            FlowStage::Withdrawing,
            self.config.withdraw_timeout_secs,
            run.deadline,
            &run.cancel,
            mixer.unshield(&ephemeral, &recipient, amount),
        )
        .await;
        match withdrawn {
            Ok(tx) => {
                tracing::info!(%tx, %recipient, "funds withdrawn");
                ephemeral.scrub();
                run.artifacts.withdraw_tx = Some(tx);
            }
            Err(e) => {
                run.partial = true;
                if e.is_interrupted() {
                    ephemeral.scrub();
                } else {
                    run.cleanup.hold_ephemeral(ephemeral);
                }
                run.warn(format!("withdrawal failed; attestation stands: {e}"));
            }
        }
        Ok(())
    }
}
