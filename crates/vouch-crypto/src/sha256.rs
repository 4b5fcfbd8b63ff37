//! # SHA-256 Helpers
//!
//! Every hash in the protocol is SHA-256 over a concatenation of byte
//! slices. [`sha256_concat`] feeds the parts to one hasher in order, which is
//! equivalent to hashing the concatenated buffer without allocating it.

use sha2::{Digest, Sha256};

/// SHA-256 of a single byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 of `parts[0] ‖ parts[1] ‖ …`.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
