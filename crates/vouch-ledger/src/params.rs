//! Tunables of the in-memory ledger model.

use serde::{Deserialize, Serialize};

/// Default daily submission cap per recipient.
pub const DEFAULT_MAX_PROOFS_PER_DAY: u32 = 10;
/// Default minimum spacing between submissions, seconds.
pub const DEFAULT_COOLDOWN_SECONDS: i64 = 60;
/// Rate-limit window length, seconds.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Ledger model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Accepted submissions per recipient per window.
    pub max_proofs_per_day: u32,
    /// Minimum seconds between accepted submissions for one recipient.
    pub cooldown_seconds: i64,
    /// How long an issued blockhash stays valid, milliseconds.
    pub blockhash_validity_ms: u64,
    /// Fee charged per required signature, lamports.
    pub fee_per_signature: u64,
    /// Rent deposit taken from the payer for each created record, lamports.
    pub record_rent: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            max_proofs_per_day: DEFAULT_MAX_PROOFS_PER_DAY,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            blockhash_validity_ms: 60_000,
            fee_per_signature: 5_000,
            record_rent: 1_300_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let params: LedgerParams = serde_yaml::from_str("cooldown_seconds: 5\n").unwrap();
        assert_eq!(params.cooldown_seconds, 5);
        assert_eq!(params.max_proofs_per_day, 10);
        assert_eq!(params.fee_per_signature, 5_000);
    }
}
