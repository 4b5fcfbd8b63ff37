//! # Hex Encoding Helpers
//!
//! Parsing is lenient about an optional `0x` / `0X` prefix and letter case
//! but strict about everything else: even length, hex alphabet only.
//! Encoding is always lowercase, no prefix, and preserves byte order
//! (`0x0f` encodes as `"0f"`).

use crate::error::ValidationError;

/// Strip an optional `0x` prefix.
pub fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Check that `s` is well-formed hex without decoding it.
pub fn check_hex(field: &'static str, s: &str) -> Result<(), ValidationError> {
    let body = strip_prefix(s);
    if body.len() % 2 != 0 {
        return Err(ValidationError::InvalidFormat {
            field,
            reason: format!("odd hex length {}", body.len()),
        });
    }
    if let Some(pos) = body.find(|c: char| !c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field,
            reason: format!("non-hex character at position {pos}"),
        });
    }
    Ok(())
}

/// Decode a hex string into bytes.
pub fn decode(field: &'static str, s: &str) -> Result<Vec<u8>, ValidationError> {
    check_hex(field, s)?;
    ::hex::decode(strip_prefix(s)).map_err(|e| ValidationError::InvalidFormat {
        field,
        reason: e.to_string(),
    })
}

/// Decode a hex string that must hold exactly 32 bytes.
pub fn decode32(field: &'static str, s: &str) -> Result<[u8; 32], ValidationError> {
    let bytes = decode(field, s)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| ValidationError::InvalidFormat {
        field,
        reason: format!("expected 32 bytes, got {len}"),
    })
}

/// Lowercase hex without prefix.
pub fn encode(bytes: &[u8]) -> String {
    ::hex::encode(bytes)
}

/// First four bytes as hex, for log lines.
pub fn short(bytes: &[u8]) -> String {
    ::hex::encode(&bytes[..bytes.len().min(4)])
}

/// Serde adapter: `Vec<u8>` as a hex string.
pub mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode("bytes", &s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Vec<[u8; 32]>` as a list of hex strings.
pub mod serde_vec32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|b| super::encode(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<[u8; 32]>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::decode32("public_input", s).map_err(serde::de::Error::custom))
            .collect()
    }
}
