//! Prove-flow configuration.

use serde::{Deserialize, Serialize};
use vouch_core::Network;

use crate::error::FlowError;

/// Lamports moved through the mixer when none is configured.
pub const DEFAULT_SHIELD_AMOUNT: u64 = 10_000_000;

/// Per-run knobs. Every field has a default so a partial YAML file works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Cluster the flow runs against. Decides mixer availability.
    pub network: Network,
    /// Route funds through the privacy mixer when it is available.
    pub use_privacy: bool,
    /// Fail the flow instead of degrading when shielding is impossible.
    pub require_privacy: bool,
    /// Accept a format-only check when the oracle is unreachable.
    pub allow_format_only_fallback: bool,
    /// Lamports shielded and later withdrawn.
    pub shield_amount: u64,

    /// Budget for the whole run, in seconds.
    pub overall_timeout_secs: u64,
    /// Cap on the shield call.
    pub shield_timeout_secs: u64,
    /// Cap on circuit load plus proof generation.
    pub proof_timeout_secs: u64,
    /// Cap on oracle verification plus ledger confirmation.
    pub submit_timeout_secs: u64,
    /// Cap on the unshield call.
    pub withdraw_timeout_secs: u64,

    /// Envelope lifetime requested from `compute_expiration`; clamped
    /// there. `None` uses the envelope default.
    pub envelope_ttl_ms: Option<u64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            use_privacy: true,
            require_privacy: false,
            allow_format_only_fallback: false,
            shield_amount: DEFAULT_SHIELD_AMOUNT,
            overall_timeout_secs: 300,
            shield_timeout_secs: 60,
            proof_timeout_secs: 120,
            submit_timeout_secs: 90,
            withdraw_timeout_secs: 60,
            envelope_ttl_ms: None,
        }
    }
}

impl FlowConfig {
    /// Reject contradictory or zero-valued settings.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.require_privacy && !self.use_privacy {
            return Err(FlowError::Config(
                "require_privacy is set but use_privacy is off".to_string(),
            ));
        }
        let timeouts = [
            ("overall_timeout_secs", self.overall_timeout_secs),
            ("shield_timeout_secs", self.shield_timeout_secs),
            ("proof_timeout_secs", self.proof_timeout_secs),
            ("submit_timeout_secs", self.submit_timeout_secs),
            ("withdraw_timeout_secs", self.withdraw_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(FlowError::Config(format!("{name} must be positive")));
        }
        if self.use_privacy && self.shield_amount == 0 {
            return Err(FlowError::Config(
                "shield_amount must be positive when privacy is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
