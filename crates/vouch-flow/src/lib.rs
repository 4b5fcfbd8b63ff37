//! # vouch-flow — Prove-Flow Orchestrator
//!
//! Runs one credential attempt end to end: optional privacy shielding,
//! proof generation, oracle verification and ledger recording, and the
//! withdrawal hop. The run is a state machine ([`stage`]) whose every
//! external await observes a single cancellation token, an overall
//! deadline and a per-stage cap.
//!
//! ## Crate Policy
//!
//! - Every run returns a [`FlowOutcome`], including on failure. Nothing is
//!   reported through panics or early returns.
//! - Privacy failures degrade the run; they never fail it unless
//!   `require_privacy` is set.
//! - Secret material lives in a [`CleanupHandle`] and is scrubbed on every
//!   exit path, including cancellation and timeout.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod mixer;
pub mod orchestrator;
pub mod progress;
pub mod stage;

pub use cleanup::{CleanupHandle, CleanupProbe};
pub use config::{FlowConfig, DEFAULT_SHIELD_AMOUNT};
pub use error::FlowError;
#[cfg(feature = "mock")]
pub use mixer::MockMixer;
pub use mixer::{EphemeralIdentity, MixerError, PrivacyMixer, ShieldReceipt};
pub use orchestrator::{FlowArtifacts, FlowOutcome, FlowRequest, ProveFlow};
pub use progress::{progress_channel, ProgressEvent, ProgressReporter};
pub use stage::{FlowStage, StageMachine, StageTransition, TransitionError};
