//! # vouch-crypto — Commitment Engine and Signing Keys
//!
//! - **Commitment engine**: wallet id, commitment and nullifier derivation.
//!   Pure SHA-256 over fixed-width preimages, no I/O, no randomness.
//! - **Identity secret**: the only random input in the protocol, drawn from
//!   the OS CSPRNG and zeroized on drop.
//! - **Ed25519**: verifier key pairs, public keys and signatures over raw
//!   attestation message bytes.
//!
//! ## Crate Policy
//!
//! - Depends only on `vouch-core` internally.
//! - No mocking of cryptographic operations in tests. Real SHA-256, real
//!   Ed25519.
//! - Secret material never implements `Serialize`, `Display` or a
//!   revealing `Debug`.

pub mod commitment;
pub mod ed25519;
pub mod error;
pub mod secret;
pub mod sha256;

pub use commitment::{derive_commitment, derive_nullifier, derive_wallet_id, nullifier_for, pad32};
pub use ed25519::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::CryptoError;
pub use secret::IdentitySecret;
pub use sha256::{sha256, sha256_concat};
