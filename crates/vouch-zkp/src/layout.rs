//! # Public Input Layout
//!
//! Both credential circuits expose 98 public inputs, each a 32-byte
//! big-endian field element:
//!
//! ```text
//! [0..32)   nullifier, one byte per element
//! [32..64)  commitment, one byte per element
//! [64..96)  data_hash, one byte per element
//! 96        threshold
//! 97        epoch
//! ```
//!
//! Hashes are split byte-wise because a 256-bit digest does not fit the
//! proving field.

use vouch_core::{Commitment, DataHash, Nullifier, ValidationError, PUBLIC_INPUT_COUNT};

const NULLIFIER_AT: usize = 0;
const COMMITMENT_AT: usize = 32;
const DATA_HASH_AT: usize = 64;
const THRESHOLD_AT: usize = 96;
const EPOCH_AT: usize = 97;

/// Public inputs decoded back into protocol values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    /// Nullifier bound by the proof.
    pub nullifier: Nullifier,
    /// Commitment bound by the proof.
    pub commitment: Commitment,
    /// Credential data digest.
    pub data_hash: DataHash,
    /// Threshold the credential was proven against.
    pub threshold: u64,
    /// Attestation epoch.
    pub epoch: u64,
}

/// `value` as a big-endian field element.
pub fn field_element(value: u64) -> [u8; 32] {
    let mut el = [0u8; 32];
    el[24..].copy_from_slice(&value.to_be_bytes());
    el
}

fn small_value(field: &'static str, el: &[u8; 32], max_bits: u32) -> Result<u64, ValidationError> {
    if el[..24].iter().any(|b| *b != 0) {
        return Err(ValidationError::MalformedField {
            field,
            reason: "element exceeds 64 bits".to_string(),
        });
    }
    let mut word = [0u8; 8];
    word.copy_from_slice(&el[24..]);
    let value = u64::from_be_bytes(word);
    if max_bits < 64 && value >> max_bits != 0 {
        return Err(ValidationError::MalformedField {
            field,
            reason: format!("element exceeds {max_bits} bits"),
        });
    }
    Ok(value)
}

fn split(bytes: &[u8; 32]) -> impl Iterator<Item = [u8; 32]> + '_ {
    bytes.iter().map(|b| field_element(u64::from(*b)))
}

fn join(field: &'static str, elements: &[[u8; 32]]) -> Result<[u8; 32], ValidationError> {
    let mut out = [0u8; 32];
    for (slot, el) in out.iter_mut().zip(elements) {
        *slot = small_value(field, el, 8)? as u8;
    }
    Ok(out)
}

impl PublicInputs {
    /// Encode into the 98-element layout.
    pub fn encode(&self) -> Vec<[u8; 32]> {
        let mut out = Vec::with_capacity(PUBLIC_INPUT_COUNT);
        out.extend(split(self.nullifier.as_bytes()));
        out.extend(split(self.commitment.as_bytes()));
        out.extend(split(self.data_hash.as_bytes()));
        out.push(field_element(self.threshold));
        out.push(field_element(self.epoch));
        out
    }

    /// Decode the 98-element layout.
    pub fn decode(elements: &[[u8; 32]]) -> Result<Self, ValidationError> {
        if elements.len() != PUBLIC_INPUT_COUNT {
            return Err(ValidationError::PublicInputCount {
                expected: PUBLIC_INPUT_COUNT,
                actual: elements.len(),
            });
        }
        Ok(Self {
            nullifier: Nullifier(join("nullifier", &elements[NULLIFIER_AT..COMMITMENT_AT])?),
            commitment: Commitment(join("commitment", &elements[COMMITMENT_AT..DATA_HASH_AT])?),
            data_hash: DataHash(join("data_hash", &elements[DATA_HASH_AT..THRESHOLD_AT])?),
            threshold: small_value("threshold", &elements[THRESHOLD_AT], 64)?,
            epoch: small_value("epoch", &elements[EPOCH_AT], 64)?,
        })
    }
}
