//! `vouch validate-envelope`: offline checks on a serialized proof envelope.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use vouch_core::{Clock, Commitment, Nullifier, ProofType, SystemClock};
use vouch_zkp::{check_format, deserialize, VerificationLevel};

use crate::print_json;

/// Arguments for `vouch validate-envelope`.
#[derive(Args, Debug)]
pub struct ValidateEnvelopeArgs {
    /// Envelope JSON file.
    pub path: PathBuf,

    /// Circuit the proof claims to satisfy.
    #[arg(long, default_value = "whale")]
    pub proof_type: ProofType,
}

/// Verdict printed by `vouch validate-envelope`.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvelopeVerdict {
    /// Every local check passed.
    Valid {
        /// Always true.
        valid: bool,
        /// Always `format_only`.
        level: VerificationLevel,
        /// Decoded nullifier.
        nullifier: Nullifier,
        /// Decoded commitment.
        commitment: Commitment,
        /// Public inputs counted.
        public_input_count: usize,
        /// Envelope expiry, unix milliseconds.
        expires_at: u64,
    },
    /// A check failed.
    Invalid {
        /// Always false.
        valid: bool,
        /// The failing check.
        error: String,
    },
}

impl EnvelopeVerdict {
    /// Whether the envelope passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Run the format checks on `raw` at `clock`'s time.
pub fn validate_envelope(raw: &str, proof_type: ProofType, clock: &dyn Clock) -> EnvelopeVerdict {
    let checked = deserialize(raw).and_then(|envelope| {
        check_format(&envelope, proof_type, clock).map(|report| (report, envelope.expires_at))
    });
    match checked {
        Ok((report, expires_at)) => EnvelopeVerdict::Valid {
            valid: true,
            level: report.level,
            nullifier: report.nullifier,
            commitment: report.commitment,
            public_input_count: report.public_input_count,
            expires_at,
        },
        Err(e) => EnvelopeVerdict::Invalid {
            valid: false,
            error: e.to_string(),
        },
    }
}

/// Execute `vouch validate-envelope`. Exit code 2 on an invalid envelope.
pub fn run_validate(args: &ValidateEnvelopeArgs) -> Result<u8> {
    let raw = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading envelope {}", args.path.display()))?;
    let verdict = validate_envelope(&raw, args.proof_type, &SystemClock);
    print_json(&verdict)?;
    Ok(if verdict.is_valid() { 0 } else { 2 })
}
