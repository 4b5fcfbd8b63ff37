//! # Circuit Loader
//!
//! Loading a proving circuit is slow and memory-hungry, so the loaded
//! artifact is a read-mostly shared singleton per proof type.
//!
//! - Concurrent `load` calls for the same proof type share one in-flight
//!   fetch (`futures::future::Shared`) instead of issuing duplicates.
//! - Loaded circuits are cached for a TTL (one hour by default) measured on
//!   the injected [`Clock`].
//! - Failed loads are not cached; the next caller retries.
//!
//! ## Reset
//!
//! Every reset bumps a generation counter. [`CircuitLoader::reset_if`] is a
//! compare-and-clear: it only clears when the caller's observed generation
//! is still current, so two callers racing to tear down the same broken
//! state clear it once. A fetch started under an older generation never
//! publishes into the cache after a reset.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use vouch_core::{Clock, ProofType};

use crate::error::ProverError;
use crate::traits::{Circuit, CircuitSource};

/// Default lifetime of a loaded circuit.
pub const DEFAULT_CIRCUIT_TTL_MS: u64 = 3_600_000;

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<Circuit>, ProverError>>>;

#[derive(Default)]
struct LoaderState {
    generation: u64,
    cached: HashMap<ProofType, (Arc<Circuit>, u64)>,
    inflight: HashMap<ProofType, (u64, LoadFuture)>,
}

/// Deduplicating, TTL-caching circuit loader.
pub struct CircuitLoader {
    source: Arc<dyn CircuitSource>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    state: Mutex<LoaderState>,
}

impl fmt::Debug for CircuitLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitLoader")
            .field("ttl_ms", &self.ttl_ms)
            .field("generation", &state.generation)
            .field("cached", &state.cached.len())
            .field("inflight", &state.inflight.len())
            .finish()
    }
}

impl CircuitLoader {
    /// Loader with the default one-hour TTL.
    pub fn new(source: Arc<dyn CircuitSource>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(source, clock, DEFAULT_CIRCUIT_TTL_MS)
    }

    /// Loader with a custom TTL in milliseconds.
    pub fn with_ttl(source: Arc<dyn CircuitSource>, clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            source,
            clock,
            ttl_ms,
            state: Mutex::new(LoaderState::default()),
        }
    }

    /// Availability probe of the underlying engine.
    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    /// Current reset generation.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Return the cached circuit for `proof_type`, or load it, joining an
    /// in-flight load if one exists.
    pub async fn load(&self, proof_type: ProofType) -> Result<Arc<Circuit>, ProverError> {
        let (generation, pending) = {
            let mut state = self.state.lock();
            let now = self.clock.now_ms();

            let fresh = state
                .cached
                .get(&proof_type)
                .filter(|(_, loaded_at)| now.saturating_sub(*loaded_at) < self.ttl_ms)
                .map(|(circuit, _)| Arc::clone(circuit));
            if let Some(circuit) = fresh {
                tracing::debug!(%proof_type, "circuit cache hit");
                return Ok(circuit);
            }
            state.cached.remove(&proof_type);

            let joined = state
                .inflight
                .get(&proof_type)
                .map(|(generation, fut)| (*generation, fut.clone()));
            match joined {
                Some(existing) => {
                    tracing::debug!(%proof_type, "joining in-flight circuit load");
                    existing
                }
                None => {
                    tracing::info!(%proof_type, circuit = proof_type.circuit_id(), "loading circuit");
                    let source = Arc::clone(&self.source);
                    let fut: LoadFuture = async move { source.fetch(proof_type).await.map(Arc::new) }
                        .boxed()
                        .shared();
                    let generation = state.generation;
                    state.inflight.insert(proof_type, (generation, fut.clone()));
                    (generation, fut)
                }
            }
        };

        let result = pending.await;

        let mut state = self.state.lock();
        if state.generation == generation {
            let started_here = matches!(
                state.inflight.get(&proof_type),
                Some((g, _)) if *g == generation
            );
            if started_here {
                state.inflight.remove(&proof_type);
            }
            match &result {
                Ok(circuit) => {
                    state
                        .cached
                        .entry(proof_type)
                        .or_insert_with(|| (Arc::clone(circuit), self.clock.now_ms()));
                }
                Err(err) => {
                    tracing::warn!(%proof_type, error = %err, "circuit load failed");
                }
            }
        }
        result
    }

    /// Drop every cached and in-flight load and bump the generation.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        Self::clear(&mut state);
    }

    /// Reset only if the generation is still `expected`. Returns whether
    /// this call performed the reset.
    pub fn reset_if(&self, expected: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != expected {
            return false;
        }
        Self::clear(&mut state);
        true
    }

    fn clear(state: &mut LoaderState) {
        state.cached.clear();
        state.inflight.clear();
        state.generation = state.generation.wrapping_add(1);
        tracing::info!(generation = state.generation, "circuit loader reset");
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::mock::MockCircuitSource;
    use std::time::Duration;
    use vouch_core::ManualClock;

    fn loader(source: Arc<MockCircuitSource>, clock: Arc<ManualClock>) -> CircuitLoader {
        CircuitLoader::new(source, clock)
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let source = Arc::new(MockCircuitSource::new().with_delay(Duration::from_millis(30)));
        let loader = loader(Arc::clone(&source), Arc::new(ManualClock::new(0)));

        let results = futures::future::join_all((0..8).map(|_| loader.load(ProofType::Whale))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(source.fetches(), 1);

        loader.load(ProofType::Whale).await.unwrap();
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_distinct_proof_types_load_separately() {
        let source = Arc::new(MockCircuitSource::new());
        let loader = loader(Arc::clone(&source), Arc::new(ManualClock::new(0)));
        let dev = loader.load(ProofType::Developer).await.unwrap();
        let whale = loader.load(ProofType::Whale).await.unwrap();
        assert_eq!(dev.id, "dev_reputation");
        assert_eq!(whale.id, "whale_trading");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_ttl_expiry_reloads() {
        let source = Arc::new(MockCircuitSource::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let loader = loader(Arc::clone(&source), Arc::clone(&clock));

        loader.load(ProofType::Developer).await.unwrap();
        clock.advance(DEFAULT_CIRCUIT_TTL_MS - 1);
        loader.load(ProofType::Developer).await.unwrap();
        assert_eq!(source.fetches(), 1);

        clock.advance(1);
        loader.load(ProofType::Developer).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = Arc::new(MockCircuitSource::new().unavailable());
        let loader = loader(Arc::clone(&source), Arc::new(ManualClock::new(0)));
        assert!(!loader.is_available());
        assert!(loader.load(ProofType::Whale).await.is_err());
        assert!(loader.load(ProofType::Whale).await.is_err());
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_reset_if_is_compare_and_clear() {
        let source = Arc::new(MockCircuitSource::new());
        let loader = loader(Arc::clone(&source), Arc::new(ManualClock::new(0)));
        loader.load(ProofType::Whale).await.unwrap();

        let observed = loader.generation();
        assert!(loader.reset_if(observed));
        // A second caller holding the same stale generation does nothing.
        assert!(!loader.reset_if(observed));
        assert_eq!(loader.generation(), observed + 1);

        loader.load(ProofType::Whale).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_load_started_before_reset_does_not_publish() {
        let source = Arc::new(MockCircuitSource::new().with_delay(Duration::from_millis(30)));
        let loader = loader(Arc::clone(&source), Arc::new(ManualClock::new(0)));

        let (first, ()) = tokio::join!(loader.load(ProofType::Whale), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            loader.reset();
        });
        assert!(first.is_ok());

        loader.load(ProofType::Whale).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }
}
