//! # Privacy Mixer Interface
//!
//! The mixer breaks the on-chain link between the proving wallet and the
//! wallet that receives the credential. Funds are shielded into an
//! ephemeral identity before proving and unshielded to the recipient
//! afterwards. The mixer itself is an external collaborator; only its
//! availability probe and two calls are modelled.
//!
//! ## Security Invariant
//!
//! The ephemeral signing seed lives in a `Zeroizing` buffer and is wiped
//! when the identity is scrubbed or dropped.

use async_trait::async_trait;
use rand::RngCore;
use thiserror::Error;
use vouch_attestation::Address;
use vouch_core::Network;
use vouch_crypto::Ed25519KeyPair;
use zeroize::{Zeroize, Zeroizing};

/// Failure of the privacy mixer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixerError {
    /// Mixer not deployed on this network or not reachable.
    #[error("privacy mixer unavailable: {0}")]
    Unavailable(String),

    /// The mixer refused the operation.
    #[error("privacy mixer rejected operation: {0}")]
    Rejected(String),
}

impl MixerError {
    /// Reachability failures may clear up; rejections will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// ─── Ephemeral identity ──────────────────────────────────────────────

/// One-shot key holding shielded funds between the two mixer hops.
pub struct EphemeralIdentity {
    seed: Zeroizing<[u8; 32]>,
    address: Address,
    scrubbed: bool,
}

impl EphemeralIdentity {
    /// Fresh identity from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        let identity = Self::from_seed(seed);
        seed.zeroize();
        identity
    }

    /// Identity for a fixed seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let address = Address::from(Ed25519KeyPair::from_seed(&seed).public_key());
        Self {
            seed: Zeroizing::new(seed),
            address,
            scrubbed: false,
        }
    }

    /// Public address of the ephemeral key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signing key for the unshield hop. `None` once scrubbed.
    pub fn keypair(&self) -> Option<Ed25519KeyPair> {
        (!self.scrubbed).then(|| Ed25519KeyPair::from_seed(&self.seed))
    }

    /// Wipe the seed. Idempotent.
    pub fn scrub(&mut self) {
        self.seed.zeroize();
        self.scrubbed = true;
    }

    /// Whether [`scrub`](Self::scrub) has run.
    pub fn is_scrubbed(&self) -> bool {
        self.scrubbed
    }
}

impl std::fmt::Debug for EphemeralIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralIdentity")
            .field("address", &self.address)
            .field("seed", &"<redacted>")
            .field("scrubbed", &self.scrubbed)
            .finish()
    }
}

/// Result of a successful shield.
#[derive(Debug)]
pub struct ShieldReceipt {
    /// Mixer transaction id.
    pub tx_id: String,
    /// Identity now holding the shielded funds.
    pub ephemeral: EphemeralIdentity,
}

// ─── Mixer trait ─────────────────────────────────────────────────────

/// External privacy mixer.
#[async_trait]
pub trait PrivacyMixer: Send + Sync {
    /// Whether the mixer is deployed on `network`.
    fn is_available(&self, network: Network) -> bool;

    /// Move `amount` into a fresh ephemeral identity.
    async fn shield(&self, amount: u64) -> Result<ShieldReceipt, MixerError>;

    /// Move `amount` from `ephemeral` to `recipient`.
    async fn unshield(
        &self,
        ephemeral: &EphemeralIdentity,
        recipient: &Address,
        amount: u64,
    ) -> Result<String, MixerError>;
}

// ─── Mock ────────────────────────────────────────────────────────────

#[cfg(feature = "mock")]
pub use mock::MockMixer;

#[cfg(feature = "mock")]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// In-process mixer for tests and the simulator.
    #[derive(Debug)]
    pub struct MockMixer {
        networks: Vec<Network>,
        delay: Option<Duration>,
        shield_error: Option<MixerError>,
        unshield_error: Option<MixerError>,
        shields: AtomicUsize,
        unshields: AtomicUsize,
    }

    impl Default for MockMixer {
        fn default() -> Self {
            Self {
                networks: vec![Network::Mainnet, Network::Devnet, Network::Localnet],
                delay: None,
                shield_error: None,
                unshield_error: None,
                shields: AtomicUsize::new(0),
                unshields: AtomicUsize::new(0),
            }
        }
    }

    impl MockMixer {
        /// Mixer available on every network.
        pub fn new() -> Self {
            Self::default()
        }

        /// Restrict availability to `networks`.
        pub fn on_networks(mut self, networks: &[Network]) -> Self {
            self.networks = networks.to_vec();
            self
        }

        /// Sleep before answering each call.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Fail every shield with `err`.
        pub fn failing_shield(mut self, err: MixerError) -> Self {
            self.shield_error = Some(err);
            self
        }

        /// Fail every unshield with `err`.
        pub fn failing_unshield(mut self, err: MixerError) -> Self {
            self.unshield_error = Some(err);
            self
        }

        /// Shield calls so far.
        pub fn shields(&self) -> usize {
            self.shields.load(Ordering::SeqCst)
        }

        /// Unshield calls so far.
        pub fn unshields(&self) -> usize {
            self.unshields.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PrivacyMixer for MockMixer {
        fn is_available(&self, network: Network) -> bool {
            self.networks.contains(&network)
        }

        async fn shield(&self, amount: u64) -> Result<ShieldReceipt, MixerError> {
            let n = self.shields.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = &self.shield_error {
                return Err(err.clone());
            }
            let ephemeral = EphemeralIdentity::generate();
            Ok(ShieldReceipt {
                tx_id: format!("shield-{n}-{amount}-{}", ephemeral.address()),
                ephemeral,
            })
        }

        async fn unshield(
            &self,
            ephemeral: &EphemeralIdentity,
            recipient: &Address,
            amount: u64,
        ) -> Result<String, MixerError> {
            let n = self.unshields.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = &self.unshield_error {
                return Err(err.clone());
            }
            if ephemeral.is_scrubbed() {
                return Err(MixerError::Rejected(
                    "ephemeral identity already scrubbed".to_string(),
                ));
            }
            Ok(format!("unshield-{n}-{amount}-{recipient}"))
        }
    }
}
