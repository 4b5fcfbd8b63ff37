//! # Flow Stage Machine
//!
//! ```text
//! idle ──► shielding ──► generating-proof ──► submitting ──► withdrawing ──► complete
//!   └────────────────────────►┘                   └──────────────────────────►┘
//! ```
//!
//! `error` is reachable from every non-terminal stage. `complete` and
//! `error` are terminal. Every transition is appended to an ordered log so
//! a failed run can be diagnosed from its outcome alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vouch_core::Clock;

// ─── Stage ───────────────────────────────────────────────────────────

/// Stage of one prove-flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowStage {
    /// Not started.
    Idle,
    /// Moving funds into the privacy mixer.
    Shielding,
    /// Running the external prover.
    GeneratingProof,
    /// Oracle verification and on-ledger recording.
    Submitting,
    /// Moving funds out of the mixer to the recipient.
    Withdrawing,
    /// Finished (terminal).
    Complete,
    /// Failed (terminal).
    Error,
}

impl FlowStage {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether `self → to` is a legal edge.
    pub fn can_transition_to(&self, to: FlowStage) -> bool {
        use FlowStage::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (*self, to),
            (Idle, Shielding)
                | (Idle, GeneratingProof)
                | (Shielding, GeneratingProof)
                | (GeneratingProof, Submitting)
                | (Submitting, Withdrawing)
                | (Submitting, Complete)
                | (Withdrawing, Complete)
                | (_, Error)
        )
    }

    /// Progress percentage reported on entering this stage.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Shielding => 10,
            Self::GeneratingProof => 30,
            Self::Submitting => 70,
            Self::Withdrawing => 90,
            Self::Complete | Self::Error => 100,
        }
    }
}

impl std::fmt::Display for FlowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Shielding => "shielding",
            Self::GeneratingProof => "generating-proof",
            Self::Submitting => "submitting",
            Self::Withdrawing => "withdrawing",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Illegal stage change. Indicates an orchestrator bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Edge not in the graph.
    #[error("invalid flow transition: {from} -> {to}")]
    InvalidTransition {
        /// Current stage.
        from: FlowStage,
        /// Requested stage.
        to: FlowStage,
    },

    /// The run already finished.
    #[error("flow is in terminal stage {stage}")]
    TerminalStage {
        /// The terminal stage.
        stage: FlowStage,
    },
}

// ─── Transition log ──────────────────────────────────────────────────

/// One recorded stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    /// Stage left.
    pub from: FlowStage,
    /// Stage entered.
    pub to: FlowStage,
    /// Unix milliseconds.
    pub at_ms: u64,
    /// Why.
    pub note: String,
}

/// Current stage plus the transitions that led to it.
#[derive(Debug)]
pub struct StageMachine {
    stage: FlowStage,
    log: Vec<StageTransition>,
    clock: Arc<dyn Clock>,
}

impl StageMachine {
    /// Machine in [`FlowStage::Idle`].
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            stage: FlowStage::Idle,
            log: Vec::new(),
            clock,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    /// Ordered transition log.
    pub fn log(&self) -> &[StageTransition] {
        &self.log
    }

    /// Move to `to`, recording `note`.
    pub fn advance(&mut self, to: FlowStage, note: impl Into<String>) -> Result<(), TransitionError> {
        if self.stage.is_terminal() {
            return Err(TransitionError::TerminalStage { stage: self.stage });
        }
        if !self.stage.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        let note = note.into();
        tracing::info!(from = %self.stage, to = %to, "{note}");
        self.log.push(StageTransition {
            from: self.stage,
            to,
            at_ms: self.clock.now_ms(),
            note,
        });
        self.stage = to;
        Ok(())
    }

    /// Enter [`FlowStage::Error`] from wherever the run is. Returns the
    /// stage that failed; no-op if already terminal.
    pub fn fail(&mut self, note: impl Into<String>) -> FlowStage {
        let failed = self.stage;
        if !failed.is_terminal() {
            let note = note.into();
            tracing::error!(stage = %failed, "flow failed: {note}");
            self.log.push(StageTransition {
                from: failed,
                to: FlowStage::Error,
                at_ms: self.clock.now_ms(),
                note,
            });
            self.stage = FlowStage::Error;
        }
        failed
    }
}
