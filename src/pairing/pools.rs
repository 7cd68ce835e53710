//! Classifies posteriors into the four scheduling pools the selection
//! policy draws from.

use crate::rating::Posterior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Unseen,
    Active,
    SkippedEligible,
    SkippedCooldown,
}

#[must_use]
pub fn classify(p: &Posterior, current_round: u64) -> Pool {
    if p.exposures == 0 {
        return Pool::Unseen;
    }
    if p.next_eligible_round > current_round {
        return Pool::SkippedCooldown;
    }
    if p.next_eligible_round > 0 && p.skips > 0 {
        return Pool::SkippedEligible;
    }
    Pool::Active
}

/// Borrowed partition of a posterior slice into its four pools.
#[derive(Debug, Default)]
pub struct Pools<'a> {
    pub unseen: Vec<&'a Posterior>,
    pub active: Vec<&'a Posterior>,
    pub skipped_eligible: Vec<&'a Posterior>,
    pub skipped_cooldown: Vec<&'a Posterior>,
}

impl<'a> Pools<'a> {
    #[must_use]
    pub fn partition(posteriors: &'a [Posterior], current_round: u64) -> Self {
        let mut pools = Self::default();
        for p in posteriors {
            match classify(p, current_round) {
                Pool::Unseen => pools.unseen.push(p),
                Pool::Active => pools.active.push(p),
                Pool::SkippedEligible => pools.skipped_eligible.push(p),
                Pool::SkippedCooldown => pools.skipped_cooldown.push(p),
            }
        }
        pools
    }

    /// All images eligible for pairing: every pool except `SkippedCooldown`.
    #[must_use]
    pub fn eligible(&self) -> Vec<&'a Posterior> {
        self.unseen
            .iter()
            .chain(self.active.iter())
            .chain(self.skipped_eligible.iter())
            .copied()
            .collect()
    }
}
