//! Pure Bayesian-flavored Elo math: expected score, dynamic K-factor, and the
//! posterior update applied on a committed LEFT/RIGHT/SKIP outcome.
//!
//! Nothing here touches I/O or the round counter — the Session Coordinator
//! owns sequencing, this module only computes the next `(μ, σ, ...)`.

use rand::Rng;

use crate::config::CoreConfig;
use crate::rating::model::{Outcome, Posterior};

const ELO_SCALE: f64 = 400.0;
const K_BASE: f64 = 24.0;
const K_REFERENCE_SIGMA: f64 = 350.0;
const K_MIN: f64 = 8.0;
const K_MAX: f64 = 48.0;

/// Probability that `a` beats `b`, from the standard logistic Elo formula.
#[must_use]
pub fn expected_score(mu_a: f64, mu_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((mu_b - mu_a) / ELO_SCALE))
}

/// Dynamic K-factor: scales with uncertainty, clamped to `[8, 48]`.
#[must_use]
pub fn k_factor(sigma: f64) -> f64 {
    (K_BASE * sigma / K_REFERENCE_SIGMA).clamp(K_MIN, K_MAX)
}

/// Apply a LEFT or RIGHT outcome to both posteriors in place. `left_won`
/// selects which side scored 1. Both sigmas decay by `config.sigma_decay`,
/// floored at `config.sigma_min`.
pub fn apply_rated_outcome(
    left: &mut Posterior,
    right: &mut Posterior,
    left_won: bool,
    round: u64,
    config: &CoreConfig,
) {
    let e_left = expected_score(left.mu, right.mu);
    let e_right = 1.0 - e_left;
    let s_left = if left_won { 1.0 } else { 0.0 };
    let s_right = 1.0 - s_left;

    left.mu += k_factor(left.sigma) * (s_left - e_left);
    right.mu += k_factor(right.sigma) * (s_right - e_right);

    left.sigma = (left.sigma * config.sigma_decay).max(config.sigma_min);
    right.sigma = (right.sigma * config.sigma_decay).max(config.sigma_min);

    left.exposures += 1;
    right.exposures += 1;
    left.last_seen_round = round;
    right.last_seen_round = round;

    if left_won {
        left.likes += 1;
        right.unlikes += 1;
    } else {
        left.unlikes += 1;
        right.likes += 1;
    }
}

/// Apply a SKIP to both posteriors in place. Ratings and sigma are
/// untouched; each side independently draws a cooldown window.
pub fn apply_skip(
    left: &mut Posterior,
    right: &mut Posterior,
    round: u64,
    config: &CoreConfig,
    rng: &mut impl Rng,
) {
    for side in [left, right] {
        side.skips += 1;
        side.exposures += 1;
        side.last_seen_round = round;
        let delta = rng.gen_range(config.skip_cooldown_min..=config.skip_cooldown_max);
        side.next_eligible_round = round + delta;
    }
}

/// Apply whichever outcome the coordinator committed, returning nothing —
/// both posteriors are mutated in place so the caller can snapshot before
/// and after for the choice log.
pub fn apply_outcome(
    left: &mut Posterior,
    right: &mut Posterior,
    outcome: Outcome,
    round: u64,
    config: &CoreConfig,
    rng: &mut impl Rng,
) {
    match outcome {
        Outcome::Left => apply_rated_outcome(left, right, true, round, config),
        Outcome::Right => apply_rated_outcome(left, right, false, round, config),
        Outcome::Skip => apply_skip(left, right, round, config, rng),
    }
}
