//! Property tests for envelope transport and expiry.

use proptest::prelude::*;
use vouch_core::{Commitment, DataHash, ManualClock, Nullifier};
use vouch_zkp::{compute_expiration, deserialize, is_expired, serialize, ProofEnvelope};

fn envelope(proof: Vec<u8>, clock: &ManualClock, ttl: Option<u64>) -> ProofEnvelope {
    ProofEnvelope::new(
        proof,
        vec![[0xffu8; 32], [0u8; 32]],
        &Nullifier([0x11; 32]),
        &Commitment([0x22; 32]),
        19_700,
        &DataHash([0x33; 32]),
        compute_expiration(clock, ttl),
    )
}

#[test]
fn test_round_trip_boundary_lengths() {
    let clock = ManualClock::new(1_700_000_000_000);
    for len in [0usize, 1, 4096] {
        for fill in [0x00u8, 0xff] {
            let env = envelope(vec![fill; len], &clock, None);
            let json = serialize(&env).unwrap();
            assert_eq!(deserialize(&json).unwrap(), env, "len={len} fill={fill:#04x}");
        }
    }
}

proptest! {
    /// Arbitrary proof bytes survive transport in order.
    #[test]
    fn prop_round_trip(proof in proptest::collection::vec(any::<u8>(), 0..=4096)) {
        let clock = ManualClock::new(1_700_000_000_000);
        let env = envelope(proof, &clock, None);
        let back = deserialize(&serialize(&env).unwrap()).unwrap();
        prop_assert_eq!(back, env);
    }

    /// Expiry is strict for every TTL the clamp admits.
    #[test]
    fn prop_expiry_boundary(ttl in 0u64..4_000_000) {
        let clock = ManualClock::new(1_000_000);
        let env = envelope(vec![1], &clock, Some(ttl));
        prop_assert!(env.expires_at - env.generated_at >= 60_000);
        prop_assert!(env.expires_at - env.generated_at <= 1_800_000);

        clock.set(env.expires_at - 1);
        prop_assert!(!is_expired(&env, &clock));
        clock.set(env.expires_at);
        prop_assert!(!is_expired(&env, &clock));
        clock.set(env.expires_at + 1);
        prop_assert!(is_expired(&env, &clock));
    }
}
