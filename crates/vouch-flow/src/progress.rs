//! Typed progress events, delivered over a bounded channel.
//!
//! Reporting never blocks the flow: if the receiver is slow or gone, the
//! event is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::stage::FlowStage;

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage the flow is in.
    pub stage: FlowStage,
    /// Human-readable note.
    pub message: String,
    /// Completion estimate, 0 to 100.
    pub percent: u8,
}

/// Sending half handed to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressReporter {
    /// Reporter that discards every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Report `message` for `stage` at the stage's nominal percentage.
    pub fn emit(&self, stage: FlowStage, message: impl Into<String>) {
        self.emit_at(stage, message, stage.percent());
    }

    /// Report with an explicit percentage, capped at 100.
    pub fn emit_at(&self, stage: FlowStage, message: impl Into<String>, percent: u8) {
        let Some(tx) = &self.tx else { return };
        let event = ProgressEvent {
            stage,
            message: message.into(),
            percent: percent.min(100),
        };
        if let Err(e) = tx.try_send(event) {
            tracing::trace!("progress event dropped: {e}");
        }
    }
}

/// Reporter plus the receiver it feeds, holding up to `capacity` events.
pub fn progress_channel(capacity: usize) -> (ProgressReporter, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressReporter { tx: Some(tx) }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (reporter, mut rx) = progress_channel(8);
        reporter.emit(FlowStage::Shielding, "shielding funds");
        reporter.emit_at(FlowStage::GeneratingProof, "halfway", 250);
        drop(reporter);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.stage, FlowStage::Shielding);
        assert_eq!(first.percent, 10);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.percent, 100);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (reporter, mut rx) = progress_channel(1);
        reporter.emit(FlowStage::Idle, "one");
        reporter.emit(FlowStage::Idle, "two");
        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        ProgressReporter::disabled().emit(FlowStage::Complete, "done");
    }
}
