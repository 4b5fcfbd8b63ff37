//! # Attestation Submission
//!
//! Takes a proof envelope to a confirmed on-ledger attestation:
//!
//! 1. Local envelope checks (size, hex, expiry). No network before these.
//! 2. `GET /health`. If the oracle is unreachable and the caller allows it,
//!    fall back to [`check_format`] and stop there.
//! 3. `POST /verify`.
//! 4. Normalize the signed attestation and check it names our nullifier
//!    and proof type.
//! 5. Derive the nullifier and rate-limit record addresses.
//! 6. Nullifier record present: stop, it is spent. Otherwise prepend
//!    `init_nullifier`.
//! 7. Rate-limit record absent: prepend `init_rate_limit`.
//! 8. Append the Ed25519 verify instruction, then `record_attestation`
//!    directly after it. Sign, broadcast, confirm.
//!
//! A stale blockhash restarts from step 5 with a fresh blockhash, under the
//! same retry budget as the oracle calls. So does a confirmation timeout,
//! except that the retry first asks the ledger whether the timed-out
//! transaction landed after all. A rate-limit record created concurrently
//! by another submission rebuilds the transaction without `init_rate_limit`.
//!
//! ## Security Invariant
//!
//! The verify instruction and `record_attestation` are adjacent in one
//! transaction. The ledger reads the preceding instruction to find the
//! signature it checks; anything placed between them breaks recording.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use vouch_attestation::{
    ed25519_verify_ix, init_nullifier_ix, init_rate_limit_ix, nullifier_record_address,
    rate_limit_address, record_attestation_ix, Address, AttestationMessage, RecordAccounts,
};
use vouch_core::{Clock, ProofType};
use vouch_crypto::{Ed25519PublicKey, Ed25519Signature};
use vouch_ledger::{
    CommitmentLevel, LedgerClient, LedgerError, ProgramError, Transaction, TransactionFailure,
    TransactionSigner, TxSignature,
};
use vouch_zkp::{check_format, validate, FormatReport, ProofEnvelope, VerificationLevel};

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::oracle::{normalize_attestation, SignedAttestation, VerificationOracle, VerifyRequest};
use crate::retry::retry;

/// What to submit and for whom.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    /// Proof to verify and record.
    pub envelope: &'a ProofEnvelope,
    /// Credential type the proof is for.
    pub proof_type: ProofType,
    /// Wallet receiving the credential. Keys the rate-limit record.
    pub recipient: Address,
    /// Accept a format-only check when the oracle is unreachable.
    pub allow_format_only: bool,
}

/// Attestation confirmed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAttestation {
    /// Confirmed transaction.
    pub tx_signature: TxSignature,
    /// Message the verifier signed.
    pub attestation: AttestationMessage,
    /// Verifier signature over the message.
    pub signature: Ed25519Signature,
    /// Verifier key the ledger checked the signature against.
    pub verifier: Ed25519PublicKey,
    /// Nullifier record created by the transaction.
    pub nullifier_record: Address,
    /// Rate-limit record charged by the transaction.
    pub rate_limit_record: Address,
    /// Whether this transaction created the rate-limit record.
    pub created_rate_limit_record: bool,
    /// Build-and-send attempts, counting rebuilds after a stale blockhash.
    pub attempts: u32,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Oracle-verified and recorded on the ledger.
    Recorded(Box<RecordedAttestation>),
    /// Oracle unreachable; local format checks passed. Nothing recorded.
    FormatOnly(FormatReport),
}

impl Submission {
    /// Strength of the check behind this outcome.
    pub fn verification_level(&self) -> VerificationLevel {
        match self {
            Self::Recorded(_) => VerificationLevel::Cryptographic,
            Self::FormatOnly(report) => report.level,
        }
    }

    /// Recorded attestation, if any.
    pub fn recorded(&self) -> Option<&RecordedAttestation> {
        match self {
            Self::Recorded(r) => Some(r),
            Self::FormatOnly(_) => None,
        }
    }
}

/// Drives the verify-and-record protocol.
pub struct AttestationSubmitter {
    oracle: Arc<dyn VerificationOracle>,
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransactionSigner>,
    clock: Arc<dyn Clock>,
    config: OracleConfig,
}

impl std::fmt::Debug for AttestationSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSubmitter")
            .field("payer", &self.signer.address())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AttestationSubmitter {
    /// Submitter using `oracle`, recording through `ledger`, paying with
    /// `signer`.
    pub fn new(
        oracle: Arc<dyn VerificationOracle>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
        clock: Arc<dyn Clock>,
        config: OracleConfig,
    ) -> Self {
        Self {
            oracle,
            ledger,
            signer,
            clock,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Run the full protocol for `request`.
    pub async fn submit(
        &self,
        request: &SubmitRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Submission, OracleError> {
        let envelope = request.envelope;
        validate(envelope, self.clock.as_ref())?;
        let nullifier = envelope.nullifier()?;

        match self.check_health(cancel).await {
            Ok(()) => {}
            Err(e) if e.is_unavailable() && request.allow_format_only => {
                let report = check_format(envelope, request.proof_type, self.clock.as_ref())?;
                tracing::warn!(
                    nullifier = %nullifier.short(),
                    "oracle unavailable ({e}); proof passed format checks only and is not \
                     cryptographically verified or recorded"
                );
                return Ok(Submission::FormatOnly(report));
            }
            Err(e) => return Err(e),
        }

        let verify_request = VerifyRequest::from_envelope(envelope, request.proof_type);
        let response = retry(&self.config.retry, cancel, "verify", || {
            self.oracle.verify(&verify_request)
        })
        .await?;
        if !response.success {
            let reason = response.error.unwrap_or_else(|| "proof rejected".to_string());
            tracing::error!(nullifier = %nullifier.short(), %reason, "oracle rejected proof");
            return Err(OracleError::VerificationRejected(reason));
        }
        let wire = response.attestation.ok_or_else(|| {
            OracleError::SignatureDecodeError("oracle reported success without an attestation".into())
        })?;
        let signed = normalize_attestation(&wire, &nullifier, request.proof_type)?;
        let verifier = self.resolve_verifier(&signed)?;
        tracing::info!(
            nullifier = %nullifier.short(),
            epoch = signed.message.epoch,
            %verifier,
            "oracle attested proof"
        );

        let mut attempts = 0u32;
        let unconfirmed = Mutex::new(Vec::new());
        let recorded = retry(&self.config.retry, cancel, "record_attestation", || {
            attempts += 1;
            self.record(&signed, verifier, request.recipient, &unconfirmed, cancel)
        })
        .await?;
        Ok(Submission::Recorded(Box::new(RecordedAttestation {
            attempts,
            ..recorded
        })))
    }

    async fn check_health(&self, cancel: &CancellationToken) -> Result<(), OracleError> {
        retry(&self.config.retry, cancel, "health", || async {
            let health = self.oracle.health().await?;
            if health.is_healthy() {
                Ok(())
            } else {
                Err(OracleError::OracleUnavailable(format!(
                    "oracle reports status {:?}",
                    health.status
                )))
            }
        })
        .await
    }

    fn resolve_verifier(&self, signed: &SignedAttestation) -> Result<Ed25519PublicKey, OracleError> {
        match (self.config.verifier_pubkey, signed.verifier) {
            (Some(pinned), Some(reported)) if pinned != reported => {
                Err(OracleError::SignatureDecodeError(format!(
                    "attestation signed by {reported}, expected {pinned}"
                )))
            }
            (Some(pinned), _) => Ok(pinned),
            (None, Some(reported)) => Ok(reported),
            (None, None) => Err(OracleError::SignatureDecodeError(
                "oracle did not name its verifier key and none is configured".to_string(),
            )),
        }
    }

    /// Steps 5 to 8. Re-reads record existence and the blockhash on every
    /// call, so a retry is a full rebuild.
    async fn record(
        &self,
        signed: &SignedAttestation,
        verifier: Ed25519PublicKey,
        recipient: Address,
        unconfirmed: &Mutex<Vec<RecordedAttestation>>,
        cancel: &CancellationToken,
    ) -> Result<RecordedAttestation, OracleError> {
        if let Some(landed) = self.landed_after_timeout(unconfirmed).await? {
            return Ok(landed);
        }

        let program_id = self.config.program_id;
        let payer = self.signer.address();
        let message = signed.message;

        let nullifier_record = nullifier_record_address(&program_id, &message.nullifier)?;
        let rate_limit_record = rate_limit_address(&program_id, &recipient)?;
        tracing::debug!(%nullifier_record, %rate_limit_record, "derived record addresses");

        if self.ledger.account_exists(&nullifier_record).await? {
            return Err(OracleError::NullifierAlreadyUsed {
                nullifier: message.nullifier.short(),
            });
        }
        let mut create_rate_limit = !self.ledger.account_exists(&rate_limit_record).await?;

        loop {
            let mut instructions = vec![init_nullifier_ix(&program_id, &payer, &message.nullifier)?];
            if create_rate_limit {
                instructions.push(init_rate_limit_ix(&program_id, &payer, &recipient)?);
            }
            instructions.push(ed25519_verify_ix(&verifier, &signed.signature, &message.encode())?);
            instructions.push(record_attestation_ix(
                &RecordAccounts {
                    program_id,
                    payer,
                    recipient,
                    verifier,
                },
                &message,
                &signed.signature,
            )?);

            let blockhash = self.ledger.latest_blockhash().await?;
            let transaction = self
                .signer
                .sign(Transaction::new(payer, blockhash, instructions))
                .await?;
            let commitment: CommitmentLevel = self.config.commitment;
            let recorded = move |tx_signature| RecordedAttestation {
                tx_signature,
                attestation: message,
                signature: signed.signature,
                verifier,
                nullifier_record,
                rate_limit_record,
                created_rate_limit_record: create_rate_limit,
                attempts: 1,
            };

            match self.ledger.send_and_confirm(&transaction, commitment, cancel).await {
                Ok(tx_signature) => {
                    tracing::info!(
                        %tx_signature,
                        nullifier = %message.nullifier.short(),
                        %commitment,
                        "attestation recorded"
                    );
                    return Ok(recorded(tx_signature));
                }
                // The transaction may still land; the next attempt asks
                // about it before reading the nullifier record.
                Err(e @ LedgerError::ConfirmationTimeout { .. }) => {
                    if let Some(tx_signature) = transaction.id() {
                        tracing::warn!(%tx_signature, "confirmation timed out, status unknown");
                        unconfirmed.lock().push(recorded(tx_signature));
                    }
                    return Err(e.into());
                }
                // Another submission won the race for this nullifier.
                Err(LedgerError::TransactionFailed(TransactionFailure::Program {
                    error: ProgramError::NullifierAlreadyUsed,
                    ..
                })) => {
                    return Err(OracleError::NullifierAlreadyUsed {
                        nullifier: message.nullifier.short(),
                    })
                }
                Err(LedgerError::TransactionFailed(TransactionFailure::AccountAlreadyInUse {
                    address,
                })) if address == nullifier_record => {
                    return Err(OracleError::NullifierAlreadyUsed {
                        nullifier: message.nullifier.short(),
                    })
                }
                // Another submission for this recipient created the
                // rate-limit record first.
                Err(LedgerError::TransactionFailed(TransactionFailure::AccountAlreadyInUse {
                    address,
                })) if address == rate_limit_record && create_rate_limit => {
                    tracing::debug!(%rate_limit_record, "rate-limit record now exists, rebuilding without init");
                    create_rate_limit = false;
                }
                Err(e) => {
                    if !e.is_retryable() {
                        tracing::error!(nullifier = %message.nullifier.short(), "transaction failed: {e}");
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// First earlier attempt that timed out awaiting confirmation but has
    /// since landed.
    async fn landed_after_timeout(
        &self,
        unconfirmed: &Mutex<Vec<RecordedAttestation>>,
    ) -> Result<Option<RecordedAttestation>, OracleError> {
        let candidates = unconfirmed.lock().clone();
        for candidate in candidates {
            if self.ledger.is_confirmed(&candidate.tx_signature).await? {
                tracing::info!(
                    tx_signature = %candidate.tx_signature,
                    nullifier = %candidate.attestation.nullifier.short(),
                    "attestation recorded by an earlier timed-out transaction"
                );
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
