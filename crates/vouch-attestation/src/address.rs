//! # Ledger Addresses and Program-Derived Addresses
//!
//! Addresses are 32 bytes, rendered in base58. Records owned by the ledger
//! program live at program-derived addresses (PDAs):
//!
//! ```text
//! candidate = SHA-256(seed_0 ‖ … ‖ seed_n ‖ [bump] ‖ program_id ‖ "ProgramDerivedAddress")
//! ```
//!
//! searched from `bump = 255` downward; the first candidate that is not a
//! valid compressed Ed25519 point wins. Off-curve addresses cannot have a
//! private key, so only the program can sign for them.

use std::fmt;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use vouch_core::Nullifier;
use vouch_crypto::{sha256_concat, Ed25519PublicKey};

use crate::error::AddressError;

/// Maximum number of seeds in one derivation, bump included.
pub const MAX_SEEDS: usize = 16;
/// Maximum length of one seed.
pub const MAX_SEED_LEN: usize = 32;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seed prefix of the nullifier record.
pub const NULLIFIER_SEED: &[u8] = b"nullifier";
/// Seed prefix of the per-recipient rate-limit record.
pub const RATE_LIMIT_SEED: &[u8] = b"rate_limit";
/// Seed of the singleton config record.
pub const CONFIG_SEED: &[u8] = b"config";
/// Seed prefix of a verifier record.
pub const VERIFIER_SEED: &[u8] = b"verifier";

/// A 32-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The system program (all zeroes).
    pub const SYSTEM_PROGRAM: Address = Address([0u8; 32]);

    /// Native Ed25519 signature-verify program,
    /// `Ed25519SigVerify111111111111111111111111111`.
    pub const ED25519_PROGRAM: Address = Address([
        3, 125, 70, 214, 124, 147, 251, 190, 18, 249, 66, 143, 131, 141, 64, 255, 5, 112, 116, 73,
        39, 244, 138, 100, 252, 202, 112, 68, 128, 0, 0, 0,
    ]);

    /// Instructions sysvar, `Sysvar1nstructions1111111111111111111111111`.
    pub const INSTRUCTIONS_SYSVAR: Address = Address([
        6, 167, 213, 23, 24, 123, 209, 102, 53, 218, 212, 4, 85, 253, 194, 192, 193, 36, 198, 143,
        33, 86, 117, 165, 219, 186, 203, 95, 8, 0, 0, 0,
    ]);

    /// Deployed Vouch verifier program,
    /// `CwWhTbquAFY5dvEMctwWHddWvdsDVAxWmtGPUt6s6UxQ`.
    pub const VOUCH_PROGRAM: Address = Address([
        177, 103, 127, 191, 216, 49, 131, 68, 134, 12, 63, 80, 101, 227, 113, 184, 20, 184, 34,
        142, 146, 143, 30, 130, 38, 98, 57, 15, 190, 59, 189, 161,
    ]);

    /// Wrap raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base58 rendering.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Whether the bytes decompress to a point on the Ed25519 curve.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }
}

impl From<Ed25519PublicKey> for Address {
    fn from(pk: Ed25519PublicKey) -> Self {
        Self(pk.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::WrongLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn check_seeds(seeds: &[&[u8]]) -> Result<(), AddressError> {
    // One slot is reserved for the bump.
    if seeds.len() >= MAX_SEEDS {
        return Err(AddressError::TooManySeeds {
            count: seeds.len(),
            max: MAX_SEEDS - 1,
        });
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(AddressError::SeedTooLong {
                index,
                len: seed.len(),
                max: MAX_SEED_LEN,
            });
        }
    }
    Ok(())
}

fn candidate(seeds: &[&[u8]], bump: u8, program_id: &Address) -> Address {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 3);
    parts.extend_from_slice(seeds);
    let bump = [bump];
    parts.push(&bump);
    parts.push(program_id.as_bytes());
    parts.push(PDA_MARKER);
    Address(sha256_concat(&parts))
}

/// Derive the address for `seeds ‖ [bump]` directly. Fails if it lands on
/// the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &Address,
) -> Result<Address, AddressError> {
    check_seeds(seeds)?;
    let addr = candidate(seeds, bump, program_id);
    if addr.is_on_curve() {
        return Err(AddressError::OnCurve);
    }
    Ok(addr)
}

/// Canonical PDA: the highest bump that yields an off-curve address.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), AddressError> {
    check_seeds(seeds)?;
    for bump in (0..=u8::MAX).rev() {
        let addr = candidate(seeds, bump, program_id);
        if !addr.is_on_curve() {
            return Ok((addr, bump));
        }
    }
    Err(AddressError::NoViableBump)
}

/// `PDA("nullifier", nullifier)`.
pub fn nullifier_record_address(
    program_id: &Address,
    nullifier: &Nullifier,
) -> Result<Address, AddressError> {
    find_program_address(&[NULLIFIER_SEED, nullifier.as_bytes()], program_id).map(|(a, _)| a)
}

/// `PDA("rate_limit", recipient)`.
pub fn rate_limit_address(
    program_id: &Address,
    recipient: &Address,
) -> Result<Address, AddressError> {
    find_program_address(&[RATE_LIMIT_SEED, recipient.as_bytes()], program_id).map(|(a, _)| a)
}

/// `PDA("config")`.
pub fn config_address(program_id: &Address) -> Result<Address, AddressError> {
    find_program_address(&[CONFIG_SEED], program_id).map(|(a, _)| a)
}

/// `PDA("verifier", verifier_pubkey)`.
pub fn verifier_address(
    program_id: &Address,
    verifier: &Ed25519PublicKey,
) -> Result<Address, AddressError> {
    find_program_address(&[VERIFIER_SEED, verifier.as_bytes()], program_id).map(|(a, _)| a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_ids_render() {
        assert_eq!(
            Address::ED25519_PROGRAM.to_base58(),
            "Ed25519SigVerify111111111111111111111111111"
        );
        assert_eq!(
            Address::INSTRUCTIONS_SYSVAR.to_base58(),
            "Sysvar1nstructions1111111111111111111111111"
        );
        assert_eq!(
            Address::VOUCH_PROGRAM.to_base58(),
            "CwWhTbquAFY5dvEMctwWHddWvdsDVAxWmtGPUt6s6UxQ"
        );
        assert_eq!(
            Address::SYSTEM_PROGRAM.to_base58(),
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn test_base58_parse_roundtrip() {
        let addr: Address = "CwWhTbquAFY5dvEMctwWHddWvdsDVAxWmtGPUt6s6UxQ".parse().unwrap();
        assert_eq!(addr, Address::VOUCH_PROGRAM);
        assert!("not-base58!".parse::<Address>().is_err());
        assert_eq!(
            "1111".parse::<Address>().unwrap_err(),
            AddressError::WrongLength(4)
        );
    }

    #[test]
    fn test_pda_is_off_curve_and_deterministic() {
        let n = Nullifier([0x42; 32]);
        let a = nullifier_record_address(&Address::VOUCH_PROGRAM, &n).unwrap();
        let b = nullifier_record_address(&Address::VOUCH_PROGRAM, &n).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_on_curve());
    }

    #[test]
    fn test_pda_matches_create_with_found_bump() {
        let seeds: &[&[u8]] = &[CONFIG_SEED];
        let (addr, bump) = find_program_address(seeds, &Address::VOUCH_PROGRAM).unwrap();
        assert_eq!(
            create_program_address(seeds, bump, &Address::VOUCH_PROGRAM).unwrap(),
            addr
        );
        // Every higher bump must have landed on the curve.
        for higher in (u16::from(bump) + 1)..=255 {
            assert_eq!(
                create_program_address(seeds, higher as u8, &Address::VOUCH_PROGRAM),
                Err(AddressError::OnCurve)
            );
        }
    }

    #[test]
    fn test_pda_differs_per_seed_and_program() {
        let r1 = rate_limit_address(&Address::VOUCH_PROGRAM, &Address([1; 32])).unwrap();
        let r2 = rate_limit_address(&Address::VOUCH_PROGRAM, &Address([2; 32])).unwrap();
        let r3 = rate_limit_address(&Address([9; 32]), &Address([1; 32])).unwrap();
        assert_ne!(r1, r2);
        assert_ne!(r1, r3);
    }

    #[test]
    fn test_seed_limits() {
        let long = [0u8; 33];
        assert!(matches!(
            find_program_address(&[&long], &Address::VOUCH_PROGRAM),
            Err(AddressError::SeedTooLong { index: 0, len: 33, .. })
        ));
        let seeds: Vec<&[u8]> = vec![&b"x"[..]; 16];
        assert!(matches!(
            find_program_address(&seeds, &Address::VOUCH_PROGRAM),
            Err(AddressError::TooManySeeds { count: 16, .. })
        ));
    }
}
