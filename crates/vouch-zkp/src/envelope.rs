//! # Proof Envelope
//!
//! A generated proof plus the metadata needed to submit it. Envelopes are
//! created by proof generation, consumed once by submission, and expire on
//! a timer.
//!
//! ## Security Invariant
//!
//! - Expired envelopes fail closed. `now == expires_at` is still valid;
//!   `now > expires_at` is not.
//! - Every validation failure is terminal. An invalid or expired envelope
//!   must be regenerated, never resubmitted.
//! - Format-only checks never claim cryptographic validity. They report
//!   [`VerificationLevel::FormatOnly`] and nothing stronger.
//!
//! ## Public input size
//!
//! Public inputs are 32-byte field elements. Their aggregate size is
//! measured in significant bytes: each element counts its length with
//! leading zero bytes stripped, at least one byte. A circuit exposing a
//! 32-byte hash as 32 single-byte elements therefore costs 32 bytes, and
//! the 98-input credential circuits fit comfortably under the 1024-byte cap.

use serde::{Deserialize, Serialize};
use vouch_core::hex::{self, serde_bytes, serde_vec32};
use vouch_core::{Clock, Commitment, DataHash, Nullifier, ProofType, ValidationError};

/// Maximum proof size in bytes.
pub const MAX_PROOF_SIZE: usize = 4096;
/// Maximum aggregate public-input size in bytes.
pub const MAX_PUBLIC_INPUTS_SIZE: usize = 1024;
/// Shortest permitted envelope lifetime.
pub const MIN_TTL_MS: u64 = 60_000;
/// Longest permitted envelope lifetime.
pub const MAX_TTL_MS: u64 = 1_800_000;
/// Lifetime used when the caller does not ask for one.
pub const DEFAULT_TTL_MS: u64 = 300_000;
/// Width of one attestation epoch.
pub const EPOCH_SECONDS: u64 = 86_400;

/// How strongly a proof has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    /// Size, hex, TTL and input-count checks only. Not cryptographic.
    FormatOnly,
    /// Verified by the oracle and recorded on-chain.
    Cryptographic,
}

impl std::fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::FormatOnly => "format-only",
            Self::Cryptographic => "cryptographic",
        })
    }
}

/// Proof plus submission metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEnvelope {
    /// Raw proof bytes, hex on the wire.
    #[serde(with = "serde_bytes")]
    pub proof: Vec<u8>,
    /// 32-byte public inputs, hex on the wire.
    #[serde(with = "serde_vec32")]
    pub public_inputs: Vec<[u8; 32]>,
    /// Nullifier, 64 hex chars.
    pub nullifier: String,
    /// Commitment, 64 hex chars.
    pub commitment: String,
    /// Attestation epoch the proof was generated for.
    pub epoch: u64,
    /// Credential data digest, 64 hex chars.
    pub data_hash: String,
    /// Creation time, unix milliseconds.
    pub generated_at: u64,
    /// Expiry time, unix milliseconds.
    pub expires_at: u64,
}

/// Result of a successful format-only check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatReport {
    /// Always [`VerificationLevel::FormatOnly`].
    pub level: VerificationLevel,
    /// Decoded nullifier.
    pub nullifier: Nullifier,
    /// Decoded commitment.
    pub commitment: Commitment,
    /// Public inputs counted.
    pub public_input_count: usize,
}

impl ProofEnvelope {
    /// Assemble an envelope from typed parts and a `(generated_at,
    /// expires_at)` pair from [`compute_expiration`].
    pub fn new(
        proof: Vec<u8>,
        public_inputs: Vec<[u8; 32]>,
        nullifier: &Nullifier,
        commitment: &Commitment,
        epoch: u64,
        data_hash: &DataHash,
        (generated_at, expires_at): (u64, u64),
    ) -> Self {
        Self {
            proof,
            public_inputs,
            nullifier: nullifier.to_hex(),
            commitment: commitment.to_hex(),
            epoch,
            data_hash: data_hash.to_hex(),
            generated_at,
            expires_at,
        }
    }

    /// Decode the nullifier field; must be exactly 32 bytes.
    pub fn nullifier(&self) -> Result<Nullifier, ValidationError> {
        hex::decode32("nullifier", &self.nullifier).map(Nullifier)
    }

    /// Decode the commitment field; must be exactly 32 bytes.
    pub fn commitment(&self) -> Result<Commitment, ValidationError> {
        hex::decode32("commitment", &self.commitment).map(Commitment)
    }

    /// Decode the data hash field; must be exactly 32 bytes.
    pub fn data_hash(&self) -> Result<DataHash, ValidationError> {
        hex::decode32("data_hash", &self.data_hash).map(DataHash)
    }

    /// Public inputs as lowercase hex strings, the oracle's wire format.
    pub fn public_input_hexes(&self) -> Vec<String> {
        self.public_inputs.iter().map(|b| hex::encode(b)).collect()
    }
}

/// Reject proofs over [`MAX_PROOF_SIZE`].
pub fn validate_size(proof: &[u8]) -> Result<(), ValidationError> {
    if proof.len() > MAX_PROOF_SIZE {
        return Err(ValidationError::ProofTooLarge {
            component: "proof",
            size: proof.len(),
            max: MAX_PROOF_SIZE,
        });
    }
    Ok(())
}

/// Aggregate significant-byte size of a public-input vector.
pub fn public_inputs_size(inputs: &[[u8; 32]]) -> usize {
    inputs
        .iter()
        .map(|el| {
            let leading = el.iter().take_while(|b| **b == 0).count();
            (32 - leading).max(1)
        })
        .sum()
}

/// Reject public-input vectors over [`MAX_PUBLIC_INPUTS_SIZE`].
pub fn validate_public_inputs(inputs: &[[u8; 32]]) -> Result<(), ValidationError> {
    let size = public_inputs_size(inputs);
    if size > MAX_PUBLIC_INPUTS_SIZE {
        return Err(ValidationError::ProofTooLarge {
            component: "public inputs",
            size,
            max: MAX_PUBLIC_INPUTS_SIZE,
        });
    }
    Ok(())
}

/// `(generated_at, expires_at)` for an envelope created now. The requested
/// TTL is clamped into `[MIN_TTL_MS, MAX_TTL_MS]`.
pub fn compute_expiration(clock: &dyn Clock, ttl_ms: Option<u64>) -> (u64, u64) {
    let ttl = ttl_ms.unwrap_or(DEFAULT_TTL_MS).clamp(MIN_TTL_MS, MAX_TTL_MS);
    let generated_at = clock.now_ms();
    (generated_at, generated_at.saturating_add(ttl))
}

/// Strict expiry: `now > expires_at`.
pub fn is_expired(envelope: &ProofEnvelope, clock: &dyn Clock) -> bool {
    clock.now_ms() > envelope.expires_at
}

/// Attestation epoch for the current time.
pub fn current_epoch(clock: &dyn Clock) -> u64 {
    clock.now_ms() / 1000 / EPOCH_SECONDS
}

/// Size, hex-format and TTL checks.
pub fn validate(envelope: &ProofEnvelope, clock: &dyn Clock) -> Result<(), ValidationError> {
    validate_size(&envelope.proof)?;
    validate_public_inputs(&envelope.public_inputs)?;
    hex::check_hex("nullifier", &envelope.nullifier)?;
    hex::check_hex("commitment", &envelope.commitment)?;
    hex::check_hex("data_hash", &envelope.data_hash)?;
    if envelope.generated_at >= envelope.expires_at {
        return Err(ValidationError::InvalidFormat {
            field: "expires_at",
            reason: format!(
                "expires_at {} is not after generated_at {}",
                envelope.expires_at, envelope.generated_at
            ),
        });
    }
    let now_ms = clock.now_ms();
    if now_ms > envelope.expires_at {
        return Err(ValidationError::ProofExpired {
            expires_at_ms: envelope.expires_at,
            now_ms,
        });
    }
    Ok(())
}

/// Lower-trust local check used when the oracle is unreachable.
///
/// Adds to [`validate`]: a non-empty proof, 32-byte nullifier and
/// commitment, and exactly the number of public inputs the circuit for
/// `proof_type` exposes.
pub fn check_format(
    envelope: &ProofEnvelope,
    proof_type: ProofType,
    clock: &dyn Clock,
) -> Result<FormatReport, ValidationError> {
    validate(envelope, clock)?;
    if envelope.proof.is_empty() {
        return Err(ValidationError::InvalidFormat {
            field: "proof",
            reason: "empty proof".to_string(),
        });
    }
    let expected = proof_type.expected_public_inputs();
    if envelope.public_inputs.len() != expected {
        return Err(ValidationError::PublicInputCount {
            expected,
            actual: envelope.public_inputs.len(),
        });
    }
    Ok(FormatReport {
        level: VerificationLevel::FormatOnly,
        nullifier: envelope.nullifier()?,
        commitment: envelope.commitment()?,
        public_input_count: expected,
    })
}

/// Encode for transport.
pub fn serialize(envelope: &ProofEnvelope) -> Result<String, ValidationError> {
    serde_json::to_string(envelope).map_err(|e| ValidationError::InvalidFormat {
        field: "envelope",
        reason: e.to_string(),
    })
}

/// Decode from transport form.
pub fn deserialize(s: &str) -> Result<ProofEnvelope, ValidationError> {
    serde_json::from_str(s).map_err(|e| ValidationError::InvalidFormat {
        field: "envelope",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::ManualClock;

    const T0: u64 = 1_700_000_000_000;

    fn envelope_with(proof: Vec<u8>, inputs: usize, clock: &dyn Clock) -> ProofEnvelope {
        let mut element = [0u8; 32];
        element[31] = 1;
        ProofEnvelope::new(
            proof,
            vec![element; inputs],
            &Nullifier([0xab; 32]),
            &Commitment([0xcd; 32]),
            19_675,
            &DataHash([0xef; 32]),
            compute_expiration(clock, None),
        )
    }

    #[test]
    fn test_compute_expiration_clamps() {
        let clock = ManualClock::new(T0);
        assert_eq!(compute_expiration(&clock, Some(1000)), (T0, T0 + 60_000));
        assert_eq!(
            compute_expiration(&clock, Some(3_600_000)),
            (T0, T0 + 1_800_000)
        );
        assert_eq!(compute_expiration(&clock, None), (T0, T0 + 300_000));
        assert_eq!(compute_expiration(&clock, Some(120_000)), (T0, T0 + 120_000));
    }

    #[test]
    fn test_is_expired_boundary() {
        let clock = ManualClock::new(T0);
        let env = envelope_with(vec![1, 2, 3], 98, &clock);
        clock.set(env.expires_at - 1);
        assert!(!is_expired(&env, &clock));
        clock.set(env.expires_at);
        assert!(!is_expired(&env, &clock));
        clock.set(env.expires_at + 1);
        assert!(is_expired(&env, &clock));
    }

    #[test]
    fn test_validate_expired_fails_closed() {
        let clock = ManualClock::new(T0);
        let env = envelope_with(vec![1], 98, &clock);
        clock.set(env.expires_at + 1);
        assert!(matches!(
            validate(&env, &clock),
            Err(ValidationError::ProofExpired { .. })
        ));
    }

    #[test]
    fn test_validate_size_cap() {
        assert!(validate_size(&[0u8; 4096]).is_ok());
        assert_eq!(
            validate_size(&[0u8; 4097]),
            Err(ValidationError::ProofTooLarge {
                component: "proof",
                size: 4097,
                max: 4096
            })
        );
    }

    #[test]
    fn test_public_input_size_rule() {
        let mut full = [0u8; 32];
        full[0] = 1;
        assert_eq!(public_inputs_size(&[full]), 32);
        assert_eq!(public_inputs_size(&[[0u8; 32]]), 1);
        assert_eq!(public_inputs_size(&vec![full; 32]), 1024);
        assert!(validate_public_inputs(&vec![full; 32]).is_ok());
        assert!(matches!(
            validate_public_inputs(&vec![full; 33]),
            Err(ValidationError::ProofTooLarge { component: "public inputs", size: 1056, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_hex() {
        let clock = ManualClock::new(T0);
        let mut env = envelope_with(vec![1], 98, &clock);
        env.nullifier = "abc".to_string();
        assert!(matches!(
            validate(&env, &clock),
            Err(ValidationError::InvalidFormat { field: "nullifier", .. })
        ));
        env.nullifier = format!("0x{}", "ab".repeat(32));
        assert!(validate(&env, &clock).is_ok());
        env.commitment = "zz".repeat(32);
        assert!(matches!(
            validate(&env, &clock),
            Err(ValidationError::InvalidFormat { field: "commitment", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_times() {
        let clock = ManualClock::new(T0);
        let mut env = envelope_with(vec![1], 98, &clock);
        env.expires_at = env.generated_at;
        assert!(matches!(
            validate(&env, &clock),
            Err(ValidationError::InvalidFormat { field: "expires_at", .. })
        ));
    }

    #[test]
    fn test_check_format_public_input_count() {
        let clock = ManualClock::new(T0);
        let env = envelope_with(vec![1; 64], 0, &clock);
        assert_eq!(
            check_format(&env, ProofType::Whale, &clock).unwrap_err(),
            ValidationError::PublicInputCount {
                expected: 98,
                actual: 0
            }
        );
        let env = envelope_with(vec![1; 64], 98, &clock);
        let report = check_format(&env, ProofType::Whale, &clock).unwrap();
        assert_eq!(report.level, VerificationLevel::FormatOnly);
        assert_eq!(report.nullifier, Nullifier([0xab; 32]));
    }

    #[test]
    fn test_check_format_rejects_oversized_proof() {
        let clock = ManualClock::new(T0);
        let env = envelope_with(vec![7; 4097], 98, &clock);
        assert!(matches!(
            check_format(&env, ProofType::Developer, &clock),
            Err(ValidationError::ProofTooLarge { component: "proof", .. })
        ));
    }

    #[test]
    fn test_check_format_rejects_short_nullifier() {
        let clock = ManualClock::new(T0);
        let mut env = envelope_with(vec![1], 98, &clock);
        env.nullifier = "ab".repeat(31);
        assert!(check_format(&env, ProofType::Developer, &clock).is_err());
    }

    #[test]
    fn test_serialize_preserves_byte_order() {
        let clock = ManualClock::new(T0);
        let env = envelope_with(vec![0x0f, 0x00, 0xff], 1, &clock);
        let json = serialize(&env).unwrap();
        assert!(json.contains("\"proof\":\"0f00ff\""));
        assert_eq!(deserialize(&json).unwrap(), env);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            deserialize("{\"proof\":\"0g\"}"),
            Err(ValidationError::InvalidFormat { field: "envelope", .. })
        ));
    }

    #[test]
    fn test_current_epoch_is_unix_day() {
        let clock = ManualClock::new(86_400_000 * 3 + 5);
        assert_eq!(current_epoch(&clock), 3);
    }
}
