//! # vouch-cli — Command-Line Tool for the Vouch Client
//!
//! Provides the `vouch` binary.
//!
//! ## Subcommands
//!
//! - `vouch derive`: wallet id, nullifier and commitment for a wallet.
//! - `vouch encode-attestation` / `vouch decode-attestation`: the 125-byte
//!   v2 message.
//! - `vouch pda`: nullifier, rate-limit, config and verifier addresses.
//! - `vouch validate-envelope`: local size, hex, expiry and format checks.
//! - `vouch health`: probe the verification oracle.
//! - `vouch simulate`: a full prove flow against an in-memory ledger.
//!
//! ```bash
//! vouch derive --address 9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin --secret <hex>
//! vouch -v simulate --metric 60000 --threshold 50000 --privacy --recipient <addr>
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr.

pub mod attestation;
pub mod envelope;
pub mod identity;
pub mod oracle;
pub mod simulate;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vouch_flow::FlowConfig;
use vouch_ledger::LedgerParams;
use vouch_oracle::OracleConfig;

/// Settings read from `--config`, each section optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Oracle endpoint, verifier pinning and retry policy.
    pub oracle: OracleConfig,
    /// Prove-flow knobs.
    pub flow: FlowConfig,
    /// Ledger model used by `simulate`.
    pub ledger: LedgerParams,
}

impl CliConfig {
    /// Load `path` (or defaults) and apply `VOUCH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let raw = match path {
            Some(p) => std::fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?,
            None => String::new(),
        };
        Self::from_yaml(&raw, |name| std::env::var(name).ok())
    }

    /// Parse YAML text, then overlay environment values from `lookup`.
    pub fn from_yaml<F>(raw: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw).context("parsing config YAML")?
        };
        config.oracle = config.oracle.with_overrides(lookup)?;
        config.flow.validate()?;
        Ok(config)
    }
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runtime for subcommands that make network calls.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::Network;

    #[test]
    fn test_empty_config_is_default() {
        let config = CliConfig::from_yaml("", |_| None).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_partial_yaml_sections() {
        let raw = "oracle:\n  base_url: https://oracle.test\nflow:\n  network: mainnet\n  require_privacy: true\nledger:\n  cooldown_seconds: 5\n";
        let config = CliConfig::from_yaml(raw, |_| None).unwrap();
        assert_eq!(config.oracle.base_url, "https://oracle.test");
        assert_eq!(config.flow.network, Network::Mainnet);
        assert!(config.flow.require_privacy);
        assert_eq!(config.ledger.cooldown_seconds, 5);
        assert_eq!(config.ledger.max_proofs_per_day, 10);
    }

    #[test]
    fn test_env_overrides_file() {
        let config = CliConfig::from_yaml("oracle:\n  base_url: https://file.test\n", |name| {
            (name == "VOUCH_ORACLE_URL").then(|| "http://env.test:9000".to_string())
        })
        .unwrap();
        assert_eq!(config.oracle.base_url, "http://env.test:9000");
    }

    #[test]
    fn test_invalid_flow_config_rejected() {
        let raw = "flow:\n  use_privacy: false\n  require_privacy: true\n";
        assert!(CliConfig::from_yaml(raw, |_| None).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vouch.yaml");
        std::fs::write(&path, "oracle:\n  timeout_secs: 7\n").unwrap();
        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.oracle.timeout_secs, 7);
        assert!(CliConfig::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }
}
