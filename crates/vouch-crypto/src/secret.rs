//! # Identity Secret
//!
//! The random half of a commitment. Exists only for the duration of one
//! proof generation and is never transmitted.
//!
//! ## Security Invariant
//!
//! - The secret is drawn from `OsRng`. There is no constructor taking
//!   caller-chosen bytes outside tests.
//! - The secret bytes are zeroized on drop and on explicit [`IdentitySecret::scrub`].
//! - `Debug` redacts the secret; there is no `Display` or `Serialize`.

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use vouch_core::{Commitment, WalletId};

use crate::commitment::derive_commitment;

/// A wallet id paired with a freshly generated 32-byte secret.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct IdentitySecret {
    #[zeroize(skip)]
    wallet_id: WalletId,
    secret: [u8; 32],
    #[zeroize(skip)]
    scrubbed: bool,
}

impl IdentitySecret {
    /// Draw a new secret for `wallet_id` from the OS CSPRNG.
    pub fn generate(wallet_id: WalletId) -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self {
            wallet_id,
            secret,
            scrubbed: false,
        }
    }

    /// Fixed-secret constructor for deterministic tests.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn from_parts(wallet_id: WalletId, secret: [u8; 32]) -> Self {
        Self {
            wallet_id,
            secret,
            scrubbed: false,
        }
    }

    /// Wallet this secret belongs to.
    pub fn wallet_id(&self) -> &WalletId {
        &self.wallet_id
    }

    /// Raw secret bytes. Callers must not copy them into long-lived storage.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// `SHA-256(wallet_id ‖ secret)`.
    pub fn commitment(&self) -> Commitment {
        derive_commitment(&self.wallet_id, &self.secret)
    }

    /// Zero the secret now rather than waiting for drop. Idempotent.
    pub fn scrub(&mut self) {
        self.secret.zeroize();
        self.scrubbed = true;
    }

    /// Whether [`scrub`](Self::scrub) has run.
    pub fn is_scrubbed(&self) -> bool {
        self.scrubbed
    }
}

impl std::fmt::Debug for IdentitySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySecret")
            .field("wallet_id", &self.wallet_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
