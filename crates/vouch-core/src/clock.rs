//! # Clock — Injectable Millisecond Time Source
//!
//! Envelope expiry, cache expiry, rate-limit windows and circuit cache TTLs
//! all read time through [`Clock`]. Production code uses [`SystemClock`];
//! tests use [`ManualClock`] to pin boundaries exactly (an envelope is not
//! expired at `now == expires_at`, and that has to be testable to the
//! millisecond).

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time as unix milliseconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current unix time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Current unix time in whole seconds.
    fn now_secs(&self) -> i64 {
        (self.now_ms() / 1000) as i64
    }
}

/// Wall-clock time via `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Pre-1970 clocks clamp to zero rather than wrap.
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
