//! Oracle client configuration.

use serde::{Deserialize, Serialize};
use url::Url;
use vouch_attestation::Address;
use vouch_crypto::Ed25519PublicKey;
use vouch_ledger::CommitmentLevel;

use crate::error::OracleError;
use crate::retry::RetryPolicy;

/// Oracle URL used when none is configured.
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:3001";
/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding the oracle base URL.
pub const ENV_ORACLE_URL: &str = "VOUCH_ORACLE_URL";
/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "VOUCH_ORACLE_TIMEOUT_SECS";
/// Environment variable holding the pinned verifier key, base58.
pub const ENV_VERIFIER_PUBKEY: &str = "VOUCH_VERIFIER_PUBKEY";

/// Where the oracle lives and how submissions are confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Oracle base URL, e.g. `https://oracle.example.org`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Verifier key the attestation must come from. When unset the key the
    /// oracle reports is used.
    pub verifier_pubkey: Option<Ed25519PublicKey>,
    /// Ledger program recording attestations.
    pub program_id: Address,
    /// Confirmation depth awaited after broadcast.
    pub commitment: CommitmentLevel,
    /// Backoff for oracle calls and stale-blockhash rebuilds.
    pub retry: RetryPolicy,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORACLE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verifier_pubkey: None,
            program_id: Address::VOUCH_PROGRAM,
            commitment: CommitmentLevel::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl OracleConfig {
    /// Default configuration pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Overlay `VOUCH_ORACLE_URL`, `VOUCH_ORACLE_TIMEOUT_SECS` and
    /// `VOUCH_VERIFIER_PUBKEY` from the process environment.
    pub fn from_env() -> Result<Self, OracleError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`, which maps a variable name to its
    /// value. Unset variables leave the current value in place.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, OracleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_ORACLE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw.trim().parse().map_err(|_| {
                OracleError::Config(format!("{ENV_TIMEOUT_SECS} must be an integer, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_VERIFIER_PUBKEY) {
            let key = Ed25519PublicKey::from_base58(&raw)
                .map_err(|e| OracleError::Config(format!("{ENV_VERIFIER_PUBKEY}: {e}")))?;
            self.verifier_pubkey = Some(key);
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject unusable values before any request is made.
    pub fn validate(&self) -> Result<(), OracleError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| OracleError::Config(format!("invalid oracle URL {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OracleError::Config(format!(
                "oracle URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(OracleError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}
