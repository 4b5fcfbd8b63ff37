//! # HTTP Oracle Contract Tests
//!
//! Runs [`HttpOracle`] against wiremock servers: request construction,
//! response parsing in both attestation encodings, status-code mapping,
//! retry behaviour and the format-only fallback.

mod common;

use std::sync::Arc;

use common::{envelope, fast_config, fixture};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use vouch_attestation::AttestationMessage;
use vouch_core::{AttestationHash, ProofType};
use vouch_oracle::{
    AttestationSubmitter, HttpOracle, OracleError, Submission, SubmitRequest, VerificationOracle,
    VerifyRequest,
};
use vouch_zkp::VerificationLevel;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oracle(server: &MockServer) -> HttpOracle {
    HttpOracle::new(&fast_config(&server.uri())).expect("oracle build")
}

async fn mount_healthy(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "circuits_loaded": 2})),
        )
        .mount(server)
        .await;
}

// ── /health ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_ok_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "circuits_loaded": ["dev_reputation", "whale_trading"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let health = oracle(&server).health().await.expect("health");
    assert!(health.is_healthy());
    assert_eq!(health.circuits_loaded.count(), Some(2));
}

#[tokio::test]
async fn health_out_of_range_circuit_count_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"status":"ok","circuits_loaded":18446744073709551616}"#,
        ))
        .mount(&server)
        .await;

    let err = oracle(&server).health().await.unwrap_err();
    assert!(matches!(err, OracleError::OracleUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn health_5xx_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .mount(&server)
        .await;

    let err = oracle(&server).health().await.unwrap_err();
    assert!(matches!(err, OracleError::OracleUnavailable(_)), "{err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn health_garbage_body_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    assert!(oracle(&server).health().await.unwrap_err().is_unavailable());
}

// ── /verify ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn verify_sends_contract_body() {
    let fx = fixture();
    let env = envelope(1, ProofType::Whale, fx.clock.as_ref());
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(body_partial_json(json!({
            "proof_type": "whale",
            "nullifier": env.nullifier,
            "commitment": env.commitment,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "invalid proof"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = VerifyRequest::from_envelope(&env, ProofType::Whale);
    assert_eq!(request.public_inputs.len(), 98);
    assert_eq!(request.proof_hex.len(), 512);
    let resp = oracle(&server).verify(&request).await.expect("verify");
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("invalid proof"));
}

#[tokio::test]
async fn verify_4xx_is_rejection_with_body_reason() {
    let fx = fixture();
    let env = envelope(2, ProofType::Developer, fx.clock.as_ref());
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"success": false, "error": "public input mismatch"})),
        )
        .mount(&server)
        .await;

    let err = oracle(&server)
        .verify(&VerifyRequest::from_envelope(&env, ProofType::Developer))
        .await
        .unwrap_err();
    assert_eq!(err, OracleError::VerificationRejected("public input mismatch".into()));
}

#[tokio::test]
async fn verify_malformed_body_is_decode_error() {
    let fx = fixture();
    let env = envelope(3, ProofType::Developer, fx.clock.as_ref());
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let err = oracle(&server)
        .verify(&VerifyRequest::from_envelope(&env, ProofType::Developer))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::SignatureDecodeError(_)), "{err:?}");
}

// ── Full submission over HTTP ───────────────────────────────────────────

fn signed_response(fx: &common::Fixture, env: &vouch_zkp::ProofEnvelope, base58: bool) -> serde_json::Value {
    let message = AttestationMessage {
        proof_type: ProofType::Developer,
        nullifier: env.nullifier().unwrap(),
        epoch: env.epoch,
        data_hash: env.data_hash().unwrap(),
        attestation_hash: AttestationHash([0x77; 32]),
    }
    .encode();
    let signature = fx.verifier.sign(&message);
    if base58 {
        json!({
            "success": true,
            "attestation": {
                "signature": bs58::encode(signature.as_bytes()).into_string(),
                "signedMessage": bs58::encode(message).into_string(),
                "publicKey": fx.verifier.public_key().to_base58(),
            }
        })
    } else {
        json!({
            "success": true,
            "attestation": {
                "signature": signature.as_bytes().to_vec(),
                "message": message.to_vec(),
                "verifier": fx.verifier.public_key().to_base58(),
            }
        })
    }
}

async fn submit_with_encoding(base58: bool) {
    let fx = fixture();
    let env = envelope(if base58 { 4 } else { 5 }, ProofType::Developer, fx.clock.as_ref());
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(signed_response(&fx, &env, base58)))
        .expect(1)
        .mount(&server)
        .await;

    let submitter = AttestationSubmitter::new(
        Arc::new(oracle(&server)),
        fx.ledger.clone(),
        fx.payer.clone(),
        fx.clock.clone(),
        fast_config(&server.uri()),
    );
    let outcome = submitter
        .submit(
            &SubmitRequest {
                envelope: &env,
                proof_type: ProofType::Developer,
                recipient: fx.recipient,
                allow_format_only: false,
            },
            &CancellationToken::new(),
        )
        .await
        .expect("submit");
    assert_eq!(outcome.verification_level(), VerificationLevel::Cryptographic);
    assert!(fx.ledger.nullifier_record(&env.nullifier().unwrap()).unwrap().is_used);
}

#[tokio::test]
async fn submit_accepts_byte_array_attestation() {
    submit_with_encoding(false).await;
}

#[tokio::test]
async fn submit_accepts_base58_attestation() {
    submit_with_encoding(true).await;
}

#[tokio::test]
async fn submit_rejects_attestation_for_other_nullifier() {
    let fx = fixture();
    let env = envelope(6, ProofType::Developer, fx.clock.as_ref());
    let other = envelope(7, ProofType::Developer, fx.clock.as_ref());
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(signed_response(&fx, &other, false)))
        .mount(&server)
        .await;

    let submitter = AttestationSubmitter::new(
        Arc::new(oracle(&server)),
        fx.ledger.clone(),
        fx.payer.clone(),
        fx.clock.clone(),
        fast_config(&server.uri()),
    );
    let err = submitter
        .submit(
            &SubmitRequest {
                envelope: &env,
                proof_type: ProofType::Developer,
                recipient: fx.recipient,
                allow_format_only: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::SignatureDecodeError(_)), "{err:?}");
    assert_eq!(fx.ledger.nullifier_count(), 0);
}

#[tokio::test]
async fn submit_retries_health_then_falls_back_to_format_only() {
    let fx = fixture();
    let env = envelope(8, ProofType::Developer, fx.clock.as_ref());
    let server = MockServer::start().await;
    // max_retries = 2 in the fast config: three attempts in total.
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let submitter = AttestationSubmitter::new(
        Arc::new(oracle(&server)),
        fx.ledger.clone(),
        fx.payer.clone(),
        fx.clock.clone(),
        fast_config(&server.uri()),
    );
    let outcome = submitter
        .submit(
            &SubmitRequest {
                envelope: &env,
                proof_type: ProofType::Developer,
                recipient: fx.recipient,
                allow_format_only: true,
            },
            &CancellationToken::new(),
        )
        .await
        .expect("format-only");
    match outcome {
        Submission::FormatOnly(report) => {
            assert_eq!(report.level, VerificationLevel::FormatOnly);
            assert_eq!(report.public_input_count, 98);
        }
        other => panic!("expected format-only outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn submit_reports_exhausted_retries_without_fallback() {
    let fx = fixture();
    let env = envelope(9, ProofType::Developer, fx.clock.as_ref());
    let submitter = AttestationSubmitter::new(
        Arc::new(HttpOracle::new(&fast_config("http://127.0.0.1:1")).unwrap()),
        fx.ledger.clone(),
        fx.payer.clone(),
        fx.clock.clone(),
        fast_config("http://127.0.0.1:1"),
    );
    let err = submitter
        .submit(
            &SubmitRequest {
                envelope: &env,
                proof_type: ProofType::Developer,
                recipient: fx.recipient,
                allow_format_only: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    match err {
        OracleError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(last.is_unavailable());
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}
