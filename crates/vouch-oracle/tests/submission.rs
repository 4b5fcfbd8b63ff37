//! End-to-end submission against the in-process oracle and the in-memory
//! ledger: recording, replay rejection, stale-blockhash rebuilds,
//! unconfirmed and racing transactions, and terminal failures.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{envelope, fast_config, fixture, Fixture, FlakyLedger, ADMIN};
use tokio_util::sync::CancellationToken;
use vouch_attestation::{rate_limit_address, Address};
use vouch_core::{ProofType, ValidationError};
use vouch_crypto::Ed25519KeyPair;
use vouch_ledger::{KeypairSigner, LedgerClient, LedgerError, ProgramError, TransactionFailure};
use vouch_oracle::{AttestationSubmitter, LocalOracle, OracleError, Submission, SubmitRequest};
use vouch_zkp::{ProofEnvelope, VerificationLevel};

fn submitter(fx: &Fixture, oracle: Arc<LocalOracle>) -> AttestationSubmitter {
    AttestationSubmitter::new(
        oracle,
        fx.ledger.clone(),
        fx.payer.clone(),
        fx.clock.clone(),
        fast_config("http://local.invalid"),
    )
}

fn request(recipient: Address, envelope: &ProofEnvelope) -> SubmitRequest<'_> {
    SubmitRequest {
        envelope,
        proof_type: ProofType::Developer,
        recipient,
        allow_format_only: false,
    }
}

/// Oracle signing with the fixture's authorized verifier key.
fn local_oracle(fx: &Fixture) -> Arc<LocalOracle> {
    let oracle = LocalOracle::new(Ed25519KeyPair::from_seed(&[0x42; 32]));
    assert_eq!(oracle.public_key(), fx.verifier.public_key());
    Arc::new(oracle)
}

#[tokio::test]
async fn test_records_attestation_and_creates_both_records() {
    let fx = fixture();
    let submitter = submitter(&fx, local_oracle(&fx));
    let env = envelope(1, ProofType::Developer, fx.clock.as_ref());

    let outcome = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.verification_level(), VerificationLevel::Cryptographic);
    let recorded = outcome.recorded().unwrap();
    assert!(recorded.created_rate_limit_record);
    assert_eq!(recorded.attempts, 1);
    assert_eq!(recorded.verifier, fx.verifier.public_key());

    let nullifier = env.nullifier().unwrap();
    let record = fx.ledger.nullifier_record(&nullifier).unwrap();
    assert!(record.is_used);
    assert_eq!(record.proof_type, Some(ProofType::Developer));
    let limit = fx.ledger.rate_limit_record(&fx.recipient).unwrap();
    assert_eq!(limit.proofs_today, 1);
    assert_eq!(fx.ledger.config().total_proofs_verified, 1);
}

#[tokio::test]
async fn test_second_submission_of_same_nullifier_is_terminal() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    let submitter = submitter(&fx, oracle.clone());
    let env = envelope(2, ProofType::Developer, fx.clock.as_ref());
    submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap();

    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::NullifierAlreadyUsed { .. }), "{err:?}");
    assert!(!err.is_retryable());
    assert_eq!(fx.ledger.nullifier_count(), 1);
}

#[tokio::test]
async fn test_existing_rate_limit_record_is_reused() {
    let fx = fixture();
    let submitter = submitter(&fx, local_oracle(&fx));
    let first = envelope(3, ProofType::Developer, fx.clock.as_ref());
    submitter
        .submit(&request(fx.recipient, &first), &CancellationToken::new())
        .await
        .unwrap();

    fx.clock.advance(61_000);
    let second = envelope(4, ProofType::Developer, fx.clock.as_ref());
    let outcome = submitter
        .submit(&request(fx.recipient, &second), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!outcome.recorded().unwrap().created_rate_limit_record);
    assert_eq!(fx.ledger.rate_limit_record(&fx.recipient).unwrap().proofs_today, 2);
}

#[tokio::test]
async fn test_cooldown_rejection_surfaces_program_error() {
    let fx = fixture();
    let submitter = submitter(&fx, local_oracle(&fx));
    let first = envelope(5, ProofType::Developer, fx.clock.as_ref());
    submitter
        .submit(&request(fx.recipient, &first), &CancellationToken::new())
        .await
        .unwrap();

    let second = envelope(6, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &second), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        OracleError::TransactionFailed(LedgerError::TransactionFailed(failure)) => {
            assert_eq!(failure.program_error(), Some(ProgramError::RateLimitCooldown));
        }
        other => panic!("expected cooldown failure, got {other:?}"),
    }
    // The whole transaction rolled back, including init_nullifier.
    assert!(fx.ledger.nullifier_record(&second.nullifier().unwrap()).is_none());
}

#[tokio::test]
async fn test_stale_blockhash_rebuilds_and_succeeds() {
    let fx = fixture();
    let submitter = submitter(&fx, local_oracle(&fx));
    fx.ledger
        .inject_failure(LedgerError::TransactionFailed(TransactionFailure::BlockhashNotFound));
    let env = envelope(7, ProofType::Developer, fx.clock.as_ref());

    let outcome = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.recorded().unwrap().attempts, 2);
}

#[tokio::test]
async fn test_insufficient_funds_is_terminal() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    let poor = Arc::new(KeypairSigner::new(Ed25519KeyPair::from_seed(&[0x08; 32])));
    let submitter = AttestationSubmitter::new(
        oracle,
        fx.ledger.clone(),
        poor,
        fx.clock.clone(),
        fast_config("http://local.invalid"),
    );
    let env = envelope(8, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            OracleError::TransactionFailed(LedgerError::TransactionFailed(
                TransactionFailure::InsufficientFunds { .. }
            ))
        ),
        "{err:?}"
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unknown_verifier_rejected_by_ledger() {
    let fx = fixture();
    let rogue = Arc::new(LocalOracle::new(Ed25519KeyPair::from_seed(&[0x66; 32])));
    let submitter = submitter(&fx, rogue);
    let env = envelope(9, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::TransactionFailed(_)), "{err:?}");
    assert!(fx.ledger.nullifier_record(&env.nullifier().unwrap()).is_none());
}

#[tokio::test]
async fn test_pinned_verifier_mismatch_is_decode_error() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    let mut config = fast_config("http://local.invalid");
    config.verifier_pubkey = Some(Ed25519KeyPair::from_seed(&[0x01; 32]).public_key());
    let submitter =
        AttestationSubmitter::new(oracle, fx.ledger.clone(), fx.payer.clone(), fx.clock.clone(), config);
    let env = envelope(10, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::SignatureDecodeError(_)), "{err:?}");
}

#[tokio::test]
async fn test_oracle_rejection_is_terminal_and_not_retried() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    oracle.set_rejection(Some("proof does not verify".into()));
    let submitter = submitter(&fx, oracle.clone());
    let env = envelope(11, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, OracleError::VerificationRejected("proof does not verify".into()));
    assert_eq!(oracle.verify_calls(), 1);
}

#[tokio::test]
async fn test_unhealthy_oracle_without_fallback_fails() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    oracle.set_healthy(false);
    let submitter = submitter(&fx, oracle.clone());
    let env = envelope(12, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_unavailable(), "{err:?}");
    assert_eq!(oracle.verify_calls(), 0);
}

#[tokio::test]
async fn test_unhealthy_oracle_with_fallback_is_format_only() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    oracle.set_healthy(false);
    let submitter = submitter(&fx, oracle);
    let env = envelope(13, ProofType::Developer, fx.clock.as_ref());
    let req = SubmitRequest {
        allow_format_only: true,
        ..request(fx.recipient, &env)
    };
    let outcome = submitter.submit(&req, &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, Submission::FormatOnly(_)));
    assert_eq!(outcome.verification_level(), VerificationLevel::FormatOnly);
    assert_eq!(fx.ledger.nullifier_count(), 0);
}

#[tokio::test]
async fn test_fallback_still_enforces_input_count() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    oracle.set_healthy(false);
    let submitter = submitter(&fx, oracle);
    let mut env = envelope(14, ProofType::Developer, fx.clock.as_ref());
    env.public_inputs.clear();
    let req = SubmitRequest {
        allow_format_only: true,
        ..request(fx.recipient, &env)
    };
    let err = submitter.submit(&req, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(
        err,
        OracleError::Validation(ValidationError::PublicInputCount {
            expected: 98,
            actual: 0
        })
    );
}

#[tokio::test]
async fn test_expired_envelope_fails_before_network() {
    let fx = fixture();
    let oracle = local_oracle(&fx);
    let submitter = submitter(&fx, oracle.clone());
    let env = envelope(15, ProofType::Developer, fx.clock.as_ref());
    fx.clock.set(env.expires_at + 1);
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Validation(ValidationError::ProofExpired { .. })));
    assert_eq!(oracle.verify_calls(), 0);
}

#[tokio::test]
async fn test_paused_program_rejects_then_recovers() {
    let fx = fixture();
    let submitter = submitter(&fx, local_oracle(&fx));
    fx.ledger.pause(&ADMIN).unwrap();
    let env = envelope(16, ProofType::Developer, fx.clock.as_ref());
    let err = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        OracleError::TransactionFailed(LedgerError::TransactionFailed(failure)) => {
            assert_eq!(failure.program_error(), Some(ProgramError::ProtocolPaused));
        }
        other => panic!("expected paused failure, got {other:?}"),
    }
    fx.ledger.unpause(&ADMIN).unwrap();
    submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let fx = fixture();
    let submitter = submitter(&fx, local_oracle(&fx));
    let env = envelope(17, ProofType::Developer, fx.clock.as_ref());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = submitter.submit(&request(fx.recipient, &env), &cancel).await.unwrap_err();
    assert_eq!(err, OracleError::Cancelled);
}

fn flaky_submitter(fx: &Fixture, ledger: Arc<FlakyLedger>) -> AttestationSubmitter {
    AttestationSubmitter::new(
        local_oracle(fx),
        ledger,
        fx.payer.clone(),
        fx.clock.clone(),
        fast_config("http://local.invalid"),
    )
}

#[tokio::test]
async fn test_landed_transaction_after_timeout_is_recorded_not_replayed() {
    let fx = fixture();
    let ledger = Arc::new(FlakyLedger::new(fx.ledger.clone()));
    ledger.time_out_after_landing.store(true, Ordering::SeqCst);
    let submitter = flaky_submitter(&fx, ledger.clone());
    let env = envelope(18, ProofType::Developer, fx.clock.as_ref());

    let outcome = submitter
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap();
    let recorded = outcome.recorded().unwrap();
    assert_eq!(recorded.attempts, 2);
    assert!(recorded.created_rate_limit_record);
    assert!(fx.ledger.is_confirmed(&recorded.tx_signature).await.unwrap());
    assert_eq!(fx.ledger.config().total_proofs_verified, 1);
    assert_eq!(fx.ledger.nullifier_count(), 1);
}

#[tokio::test]
async fn test_replay_after_timeout_still_rejected() {
    let fx = fixture();
    let env = envelope(19, ProofType::Developer, fx.clock.as_ref());
    submitter(&fx, local_oracle(&fx))
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap();

    let ledger = Arc::new(FlakyLedger::new(fx.ledger.clone()));
    let err = flaky_submitter(&fx, ledger)
        .submit(&request(fx.recipient, &env), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::NullifierAlreadyUsed { .. }), "{err:?}");
}

#[tokio::test]
async fn test_concurrently_created_rate_limit_record_rebuilds_without_init() {
    let fx = fixture();
    let first = envelope(20, ProofType::Developer, fx.clock.as_ref());
    submitter(&fx, local_oracle(&fx))
        .submit(&request(fx.recipient, &first), &CancellationToken::new())
        .await
        .unwrap();
    fx.clock.advance(61_000);

    let ledger = Arc::new(FlakyLedger::new(fx.ledger.clone()));
    let record = rate_limit_address(&Address::VOUCH_PROGRAM, &fx.recipient).unwrap();
    *ledger.hide_once.lock() = Some(record);
    let second = envelope(21, ProofType::Developer, fx.clock.as_ref());
    let outcome = flaky_submitter(&fx, ledger)
        .submit(&request(fx.recipient, &second), &CancellationToken::new())
        .await
        .unwrap();
    let recorded = outcome.recorded().unwrap();
    assert!(!recorded.created_rate_limit_record);
    assert_eq!(recorded.attempts, 1);
    assert_eq!(fx.ledger.rate_limit_record(&fx.recipient).unwrap().proofs_today, 2);
}
