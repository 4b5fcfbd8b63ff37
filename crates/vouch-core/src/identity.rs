//! # Protocol Identity Types
//!
//! Newtype wrappers for the 32-byte values that flow through the protocol
//! and the [`ProofType`] enum that selects a credential circuit.
//!
//! ## Security Invariant
//!
//! Type-level distinction between commitment, nullifier and hash values
//! prevents a whole class of argument-order mistakes in the byte-exact
//! wire formats, where swapping two 32-byte fields still produces a
//! well-formed but wrong message.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Number of public inputs both credential circuits expose:
/// nullifier (32) + commitment (32) + data hash (32) + threshold (1) + epoch (1).
pub const PUBLIC_INPUT_COUNT: usize = 98;

/// Credential type being proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    /// "Deployed N programs with $X TVL."
    Developer,
    /// "Traded $Y volume."
    Whale,
}

impl ProofType {
    /// All credential types, in tag order.
    pub const ALL: [ProofType; 2] = [ProofType::Developer, ProofType::Whale];

    /// On-chain tag byte used in the attestation message and instruction.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Developer => 1,
            Self::Whale => 2,
        }
    }

    /// Parse an on-chain tag byte.
    pub fn from_tag(tag: u8) -> Result<Self, ValidationError> {
        match tag {
            1 => Ok(Self::Developer),
            2 => Ok(Self::Whale),
            other => Err(ValidationError::MalformedField {
                field: "proof_type",
                reason: format!("unknown proof type tag {other}"),
            }),
        }
    }

    /// Nullifier domain separator.
    pub fn domain(&self) -> &'static str {
        match self {
            Self::Developer => "vouch_dev",
            Self::Whale => "vouch_whale",
        }
    }

    /// Identifier of the circuit that proves this credential.
    pub fn circuit_id(&self) -> &'static str {
        match self {
            Self::Developer => "dev_reputation",
            Self::Whale => "whale_trading",
        }
    }

    /// Lowercase wire name used by the oracle HTTP contract.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Whale => "whale",
        }
    }

    /// Public inputs the circuit exposes.
    pub fn expected_public_inputs(&self) -> usize {
        PUBLIC_INPUT_COUNT
    }
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProofType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" | "dev" => Ok(Self::Developer),
            "whale" => Ok(Self::Whale),
            other => Err(ValidationError::InvalidFormat {
                field: "proof_type",
                reason: format!("unknown proof type {other:?}"),
            }),
        }
    }
}

/// Chain cluster the flow runs against. Privacy mixers are only deployed on
/// some of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production cluster.
    Mainnet,
    /// Public test cluster.
    #[default]
    Devnet,
    /// Local validator or in-memory simulation.
    Localnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        })
    }
}

macro_rules! bytes32_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Wrap raw bytes.
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Build from a slice that must be exactly 32 bytes long.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
                let arr: [u8; 32] = bytes.try_into().map_err(|_| {
                    ValidationError::wrong_length(stringify!($name), 32, bytes.len())
                })?;
                Ok(Self(arr))
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Lowercase hex, no prefix.
            pub fn to_hex(&self) -> String {
                crate::hex::encode(&self.0)
            }

            /// Parse from hex (optional `0x` prefix).
            pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
                crate::hex::decode32(stringify!($name), s).map(Self)
            }

            /// Eight-character prefix for log lines.
            pub fn short(&self) -> String {
                crate::hex::short(&self.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({}...)"), self.short())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

bytes32_newtype!(
    /// `SHA-256(wallet address bytes)`. Stands in for the wallet everywhere
    /// the address itself must not appear.
    WalletId
);

bytes32_newtype!(
    /// `SHA-256(wallet_id ‖ secret)`, published as a public input.
    Commitment
);

bytes32_newtype!(
    /// `SHA-256(wallet_id ‖ pad32(domain))`. Same wallet and proof type
    /// always give the same nullifier.
    Nullifier
);

bytes32_newtype!(
    /// Digest of the credential data the proof was computed over.
    DataHash
);

bytes32_newtype!(
    /// Opaque digest binding the verifier's internal verdict metadata.
    AttestationHash
);
