//! Property-based tests for the Rating Engine's core invariants: the sigma
//! floor never breaks under any outcome sequence, and a digest built from
//! arbitrary bytes always round-trips through its string form.

use proptest::prelude::*;

use crate::config::CoreConfig;
use crate::digest::Digest;
use crate::rating::engine::apply_outcome;
use crate::rating::model::{Outcome, Posterior};

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![Just(Outcome::Left), Just(Outcome::Right), Just(Outcome::Skip)]
}

fn fresh_pair() -> (Posterior, Posterior) {
    let a = Posterior::fresh(Digest::unchecked("a".repeat(64)));
    let b = Posterior::fresh(Digest::unchecked("b".repeat(64)));
    (a, b)
}

proptest! {
    /// Sigma never drops below `config.sigma_min`, no matter how long a
    /// sequence of LEFT/RIGHT/SKIP outcomes is applied to a pair.
    #[test]
    fn sigma_never_drops_below_the_floor(
        outcomes in prop::collection::vec(arb_outcome(), 0..200)
    ) {
        let config = CoreConfig::default();
        let (mut left, mut right) = fresh_pair();
        let mut rng = rand::thread_rng();
        for (round, outcome) in outcomes.into_iter().enumerate() {
            apply_outcome(&mut left, &mut right, outcome, round as u64, &config, &mut rng);
            prop_assert!(left.sigma >= config.sigma_min);
            prop_assert!(right.sigma >= config.sigma_min);
        }
    }

    /// Every applied outcome increments both sides' exposure counter by
    /// exactly one, rated or skipped alike.
    #[test]
    fn exposures_count_matches_outcomes_applied(
        outcomes in prop::collection::vec(arb_outcome(), 0..200)
    ) {
        let config = CoreConfig::default();
        let (mut left, mut right) = fresh_pair();
        let mut rng = rand::thread_rng();
        let count = outcomes.len() as u32;
        for (round, outcome) in outcomes.into_iter().enumerate() {
            apply_outcome(&mut left, &mut right, outcome, round as u64, &config, &mut rng);
        }
        prop_assert_eq!(left.exposures, count);
        prop_assert_eq!(right.exposures, count);
    }

    /// A SKIP never moves `mu` or `sigma` on either side.
    #[test]
    fn skip_is_a_no_op_on_rating_and_uncertainty(
        skips in 1usize..50
    ) {
        let config = CoreConfig::default();
        let (mut left, mut right) = fresh_pair();
        let mut rng = rand::thread_rng();
        let (mu_left, sigma_left) = (left.mu, left.sigma);
        let (mu_right, sigma_right) = (right.mu, right.sigma);
        for round in 0..skips {
            apply_outcome(&mut left, &mut right, Outcome::Skip, round as u64, &config, &mut rng);
        }
        prop_assert_eq!(left.mu, mu_left);
        prop_assert_eq!(left.sigma, sigma_left);
        prop_assert_eq!(right.mu, mu_right);
        prop_assert_eq!(right.sigma, sigma_right);
    }

    /// Any 32-byte value produces a `Digest` that round-trips through its
    /// string form and always carries a valid 64-lowercase-hex shape.
    #[test]
    fn digest_from_bytes_round_trips(bytes in prop::array::uniform32(any::<u8>())) {
        let d = Digest::from_bytes(&bytes);
        prop_assert_eq!(d.as_str().len(), 64);
        prop_assert!(d.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        let parsed: Digest = d.as_str().parse().expect("a freshly hashed digest must parse back");
        prop_assert_eq!(parsed, d);
    }
}
