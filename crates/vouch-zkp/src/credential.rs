//! # Credential Data
//!
//! The private facts a proof is computed over. Only their digest
//! (`data_hash`) and the threshold they are compared against ever leave the
//! client.

use serde::{Deserialize, Serialize};
use vouch_core::{DataHash, ProofType};
use vouch_crypto::sha256_concat;

/// On-chain activity being proven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialData {
    /// Deployed programs and the value locked in them.
    Developer {
        /// Number of programs deployed.
        program_count: u32,
        /// Aggregate TVL in USD.
        total_tvl: u64,
    },
    /// Trading history.
    Whale {
        /// Number of trades.
        trade_count: u32,
        /// Aggregate traded volume in USD.
        total_volume: u64,
    },
}

impl CredentialData {
    /// Credential type this data can prove.
    pub fn proof_type(&self) -> ProofType {
        match self {
            Self::Developer { .. } => ProofType::Developer,
            Self::Whale { .. } => ProofType::Whale,
        }
    }

    /// The figure compared against the threshold: TVL or volume.
    pub fn metric(&self) -> u64 {
        match self {
            Self::Developer { total_tvl, .. } => *total_tvl,
            Self::Whale { total_volume, .. } => *total_volume,
        }
    }

    /// Whether the credential meets `threshold` (inclusive).
    pub fn meets_threshold(&self, threshold: u64) -> bool {
        self.metric() >= threshold
    }

    /// `SHA-256(tag ‖ count_be ‖ metric_be)`.
    pub fn data_hash(&self) -> DataHash {
        let (count, metric) = match self {
            Self::Developer {
                program_count,
                total_tvl,
            } => (*program_count, *total_tvl),
            Self::Whale {
                trade_count,
                total_volume,
            } => (*trade_count, *total_volume),
        };
        DataHash(sha256_concat(&[
            &[self.proof_type().tag()],
            &count.to_be_bytes(),
            &metric.to_be_bytes(),
        ]))
    }
}
