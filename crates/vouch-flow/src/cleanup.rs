//! # Secret Cleanup
//!
//! A flow owns two kinds of secret material: the identity secret behind the
//! commitment, and the ephemeral key holding shielded funds. Both are moved
//! into a [`CleanupHandle`] at the start of a run. The orchestrator scrubs
//! each as soon as it is no longer needed and runs the handle on every
//! error path; whatever is still live when the caller receives the outcome
//! is scrubbed by [`CleanupHandle::run`] or, failing that, on drop.
//!
//! Running the handle is idempotent. The first run scrubs; later runs are
//! counted but change nothing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use vouch_attestation::Address;
use vouch_crypto::IdentitySecret;

use crate::mixer::EphemeralIdentity;

#[derive(Default)]
struct Secrets {
    identity: Option<IdentitySecret>,
    ephemeral: Option<EphemeralIdentity>,
}

#[derive(Default)]
struct Counters {
    invocations: AtomicUsize,
    effective: AtomicUsize,
}

/// Owns a flow's secret material until it is scrubbed.
pub struct CleanupHandle {
    secrets: Mutex<Secrets>,
    done: Mutex<bool>,
    counters: Arc<Counters>,
}

/// Read-only view of a handle's counters that outlives the handle.
#[derive(Clone)]
pub struct CleanupProbe {
    counters: Arc<Counters>,
}

impl CleanupProbe {
    /// Calls to `run`, including the one made on drop.
    pub fn invocations(&self) -> usize {
        self.counters.invocations.load(Ordering::SeqCst)
    }

    /// Runs that actually scrubbed. Never more than one.
    pub fn effective_runs(&self) -> usize {
        self.counters.effective.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CleanupProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupProbe")
            .field("invocations", &self.invocations())
            .field("effective_runs", &self.effective_runs())
            .finish()
    }
}

impl CleanupHandle {
    /// Take ownership of `identity`.
    pub fn new(identity: IdentitySecret) -> Self {
        Self {
            secrets: Mutex::new(Secrets {
                identity: Some(identity),
                ephemeral: None,
            }),
            done: Mutex::new(false),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Counters that can be inspected after the handle is gone.
    pub fn probe(&self) -> CleanupProbe {
        CleanupProbe {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Borrow the identity secret. `None` once it has been scrubbed.
    pub fn with_identity<R>(&self, f: impl FnOnce(&IdentitySecret) -> R) -> Option<R> {
        let secrets = self.secrets.lock();
        secrets
            .identity
            .as_ref()
            .filter(|s| !s.is_scrubbed())
            .map(f)
    }

    /// Scrub the identity secret now. It is no longer needed once the
    /// proof exists.
    pub fn scrub_identity(&self) {
        if let Some(identity) = self.secrets.lock().identity.as_mut() {
            identity.scrub();
        }
    }

    /// Hand the ephemeral identity from a shield to the handle.
    pub fn hold_ephemeral(&self, ephemeral: EphemeralIdentity) {
        self.secrets.lock().ephemeral = Some(ephemeral);
    }

    /// Move the ephemeral identity out for an await that must not hold the
    /// lock. It zeroizes itself if dropped before being handed back.
    pub fn take_ephemeral(&self) -> Option<EphemeralIdentity> {
        self.secrets.lock().ephemeral.take()
    }

    /// Borrow the ephemeral identity, if one is held and live.
    pub fn with_ephemeral<R>(&self, f: impl FnOnce(&EphemeralIdentity) -> R) -> Option<R> {
        let secrets = self.secrets.lock();
        secrets
            .ephemeral
            .as_ref()
            .filter(|e| !e.is_scrubbed())
            .map(f)
    }

    /// Address of the live ephemeral identity, if any. Funds shielded but
    /// not withdrawn sit there.
    pub fn ephemeral_address(&self) -> Option<Address> {
        self.with_ephemeral(|e| e.address())
    }

    /// Scrub the ephemeral identity now.
    pub fn scrub_ephemeral(&self) {
        if let Some(ephemeral) = self.secrets.lock().ephemeral.as_mut() {
            ephemeral.scrub();
        }
    }

    /// Whether no live secret material remains.
    pub fn is_clean(&self) -> bool {
        let secrets = self.secrets.lock();
        secrets.identity.as_ref().map_or(true, |s| s.is_scrubbed())
            && secrets.ephemeral.as_ref().map_or(true, |e| e.is_scrubbed())
    }

    /// Scrub everything still live. Returns `true` on the first call only.
    pub fn run(&self) -> bool {
        self.counters.invocations.fetch_add(1, Ordering::SeqCst);
        let mut done = self.done.lock();
        if *done {
            return false;
        }
        let mut secrets = self.secrets.lock();
        if let Some(identity) = secrets.identity.as_mut() {
            identity.scrub();
        }
        if let Some(ephemeral) = secrets.ephemeral.as_mut() {
            ephemeral.scrub();
        }
        *done = true;
        self.counters.effective.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("flow secrets scrubbed");
        true
    }

    /// Calls to [`run`](Self::run) so far.
    pub fn invocations(&self) -> usize {
        self.counters.invocations.load(Ordering::SeqCst)
    }

    /// Runs that actually scrubbed.
    pub fn effective_runs(&self) -> usize {
        self.counters.effective.load(Ordering::SeqCst)
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for CleanupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupHandle")
            .field("clean", &self.is_clean())
            .field("effective_runs", &self.effective_runs())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::WalletId;

    fn handle() -> CleanupHandle {
        CleanupHandle::new(IdentitySecret::from_parts(WalletId([1u8; 32]), [7u8; 32]))
    }

    #[test]
    fn test_run_is_idempotent() {
        let h = handle();
        h.hold_ephemeral(EphemeralIdentity::from_seed([3u8; 32]));
        assert!(!h.is_clean());
        assert!(h.run());
        assert!(!h.run());
        assert!(h.is_clean());
        assert_eq!(h.invocations(), 2);
        assert_eq!(h.effective_runs(), 1);
    }

    #[test]
    fn test_drop_fires_once() {
        let h = handle();
        let probe = h.probe();
        drop(h);
        assert_eq!(probe.invocations(), 1);
        assert_eq!(probe.effective_runs(), 1);
    }

    #[test]
    fn test_drop_after_run_does_not_scrub_again() {
        let h = handle();
        let probe = h.probe();
        h.run();
        drop(h);
        assert_eq!(probe.invocations(), 2);
        assert_eq!(probe.effective_runs(), 1);
    }

    #[test]
    fn test_identity_unavailable_after_scrub() {
        let h = handle();
        assert_eq!(h.with_identity(|s| *s.wallet_id()), Some(WalletId([1u8; 32])));
        h.scrub_identity();
        assert!(h.with_identity(|_| ()).is_none());
        assert!(h.is_clean());
        assert_eq!(h.effective_runs(), 0);
    }

    #[test]
    fn test_ephemeral_scrub_leaves_no_address() {
        let h = handle();
        let ephemeral = EphemeralIdentity::from_seed([4u8; 32]);
        let address = ephemeral.address();
        h.hold_ephemeral(ephemeral);
        assert_eq!(h.ephemeral_address(), Some(address));
        h.scrub_ephemeral();
        assert_eq!(h.ephemeral_address(), None);
    }
}
