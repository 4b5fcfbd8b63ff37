//! Flow-level error taxonomy. Wraps each layer's error unchanged so callers
//! can match on the underlying cause.

use thiserror::Error;
use vouch_core::{ProofType, ValidationError};
use vouch_oracle::OracleError;
use vouch_zkp::ProverError;

use crate::mixer::MixerError;
use crate::stage::{FlowStage, TransitionError};

/// Why a prove flow stopped.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The credential does not reach the threshold. Raised before any
    /// external call; not a bug.
    #[error("{proof_type} credential metric {metric} is below threshold {threshold}")]
    ThresholdNotMet {
        /// Credential type.
        proof_type: ProofType,
        /// Observed metric.
        metric: u64,
        /// Required minimum.
        threshold: u64,
    },

    /// Malformed, oversized or expired envelope. Regenerate the proof.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Circuit load or proof generation failed.
    #[error(transparent)]
    Prover(#[from] ProverError),

    /// Oracle verification or ledger recording failed.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Shielding failed while privacy was mandatory.
    #[error(transparent)]
    Privacy(#[from] MixerError),

    /// The orchestrator attempted an illegal stage change.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The caller cancelled the run.
    #[error("flow cancelled during {stage}")]
    Cancelled {
        /// Stage in progress.
        stage: FlowStage,
    },

    /// One stage exceeded its own cap.
    #[error("{stage} timed out after {limit_secs}s")]
    StageTimedOut {
        /// Stage that overran.
        stage: FlowStage,
        /// Configured cap.
        limit_secs: u64,
    },

    /// The overall run budget ran out.
    #[error("flow deadline exceeded during {stage}")]
    DeadlineExceeded {
        /// Stage in progress.
        stage: FlowStage,
    },

    /// Unusable configuration.
    #[error("flow configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Whether a fresh run with the same inputs might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Prover(e) => e.is_retryable(),
            Self::Oracle(e) => e.is_retryable() || e.is_unavailable(),
            Self::Privacy(e) => e.is_retryable(),
            Self::StageTimedOut { .. } | Self::DeadlineExceeded { .. } => true,
            Self::ThresholdNotMet { .. }
            | Self::Validation(_)
            | Self::Transition(_)
            | Self::Cancelled { .. }
            | Self::Config(_) => false,
        }
    }

    /// The wallet already holds this credential. Semantically a no-op
    /// rather than a failure of the attempt.
    pub fn is_already_credentialed(&self) -> bool {
        matches!(self, Self::Oracle(OracleError::NullifierAlreadyUsed { .. }))
    }

    /// Whether the run was stopped by the caller or a deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. } | Self::StageTimedOut { .. } | Self::DeadlineExceeded { .. }
        ) || matches!(self, Self::Oracle(OracleError::Cancelled))
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ThresholdNotMet { .. } => "threshold_not_met",
            Self::Validation(_) => "validation",
            Self::Prover(_) => "prover",
            Self::Oracle(OracleError::NullifierAlreadyUsed { .. }) => "nullifier_already_used",
            Self::Oracle(OracleError::Cancelled) => "cancelled",
            Self::Oracle(_) => "oracle",
            Self::Privacy(_) => "privacy",
            Self::Transition(_) => "transition",
            Self::Cancelled { .. } => "cancelled",
            Self::StageTimedOut { .. } | Self::DeadlineExceeded { .. } => "timed_out",
            Self::Config(_) => "config",
        }
    }
}
