//! # Proof Cache
//!
//! Persisted client-side cache of generated proof envelopes, keyed by
//! `SHA-256(wallet_id ‖ proof_type_tag ‖ threshold_be)`.
//!
//! Two independent expiries apply to every entry:
//!
//! - the envelope's own `expires_at` (strict, as [`crate::is_expired`]);
//! - the cache TTL, measured from when the entry was stored.
//!
//! A hit that fails either check is a miss and is evicted. The backing file
//! is JSON, rewritten through a temp file and rename. A corrupt file is
//! logged and treated as empty rather than failing the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use vouch_core::{Clock, ProofType, WalletId};
use vouch_crypto::sha256_concat;

use crate::envelope::{is_expired, ProofEnvelope};
use crate::error::CacheError;

/// Default cache TTL: one day.
pub const DEFAULT_CACHE_TTL_MS: u64 = 86_400_000;

const CACHE_FILE_VERSION: u32 = 1;

/// Cache key for one (wallet, proof type, threshold) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key.
    pub fn derive(wallet_id: &WalletId, proof_type: ProofType, threshold: u64) -> Self {
        Self(sha256_concat(&[
            wallet_id.as_bytes(),
            &[proof_type.tag()],
            &threshold.to_be_bytes(),
        ]))
    }

    /// Hex form used in the cache file.
    pub fn to_hex(&self) -> String {
        vouch_core::hex::encode(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    envelope: ProofEnvelope,
    stored_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

/// Persisted proof cache.
pub struct ProofCache {
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl fmt::Debug for ProofCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofCache")
            .field("path", &self.path)
            .field("ttl_ms", &self.ttl_ms)
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl ProofCache {
    /// Cache that never touches the filesystem.
    pub fn in_memory(clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            path: None,
            clock,
            ttl_ms,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open (or lazily create) the cache file at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
        ttl_ms: u64,
    ) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) if file.version == CACHE_FILE_VERSION => file.entries,
                Ok(file) => {
                    tracing::warn!(path = %path.display(), version = file.version, "unknown proof cache version, starting empty");
                    BTreeMap::new()
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "corrupt proof cache, starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self {
            path: Some(path),
            clock,
            ttl_ms,
            entries: Mutex::new(entries),
        })
    }

    fn entry_live(&self, entry: &CacheEntry, now: u64) -> bool {
        !is_expired(&entry.envelope, self.clock.as_ref())
            && now.saturating_sub(entry.stored_at) <= self.ttl_ms
    }

    /// Fetch a live envelope. Expired hits are evicted and reported as a
    /// miss.
    pub fn get(&self, key: &CacheKey) -> Option<ProofEnvelope> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        let hex = key.to_hex();
        let entry = entries.get(&hex)?;
        if self.entry_live(entry, now) {
            return Some(entry.envelope.clone());
        }
        tracing::debug!(key = %&hex[..8], "evicting expired proof cache entry");
        entries.remove(&hex);
        None
    }

    /// Store `envelope` under `key` and persist.
    pub fn put(&self, key: &CacheKey, envelope: ProofEnvelope) -> Result<(), CacheError> {
        let stored_at = self.clock.now_ms();
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_hex(),
            CacheEntry {
                envelope,
                stored_at,
            },
        );
        self.persist(&entries)
    }

    /// Remove `key`. Returns whether an entry existed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock();
        let existed = entries.remove(&key.to_hex()).is_some();
        if existed {
            self.persist(&entries)?;
        }
        Ok(existed)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| self.entry_live(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Number of stored entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            entries: entries.clone(),
        };
        let data = serde_json::to_vec_pretty(&file)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| CacheError::Io {
            path: path.display().to_string(),
            source,
        };
        std::fs::write(&tmp, &data).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}
