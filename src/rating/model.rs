//! Per-image posterior state and the outcome of a single comparison.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Which side of a comparison won, if either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Left,
    Right,
    Skip,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Skip => "SKIP",
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "SKIP" => Ok(Self::Skip),
            _ => Err(crate::error::CoreError::InvalidOutcome),
        }
    }
}

/// The posterior belief about a single image's true rating, plus its
/// exposure bookkeeping. Keyed externally by `Digest`.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    pub digest: Digest,
    pub mu: f64,
    pub sigma: f64,
    pub exposures: u32,
    pub likes: u32,
    pub unlikes: u32,
    pub skips: u32,
    pub last_seen_round: u64,
    pub next_eligible_round: u64,
    /// When this image was first observed by a scan. Immutable after insert.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Posterior {
    /// A freshly observed image: `μ=1500, σ=350`, never yet exposed.
    #[must_use]
    pub fn fresh(digest: Digest) -> Self {
        Self {
            digest,
            mu: 1500.0,
            sigma: 350.0,
            exposures: 0,
            likes: 0,
            unlikes: 0,
            skips: 0,
            last_seen_round: 0,
            next_eligible_round: 0,
            created_at: chrono::Utc::now(),
        }
    }

    /// A 95% confidence interval around `mu`, used for the boundary-gap metric.
    #[must_use]
    pub fn confidence_interval(&self) -> (f64, f64) {
        let half = 1.96 * self.sigma;
        (self.mu - half, self.mu + half)
    }
}

/// One committed round: the pair shown, the outcome, and a before/after
/// snapshot of both sides' posteriors for audit and offline replay.
#[derive(Debug, Clone)]
pub struct ChoiceRecord {
    pub round: u64,
    pub left_digest: Digest,
    pub right_digest: Digest,
    pub outcome: Outcome,
    pub left_mu_before: f64,
    pub left_mu_after: f64,
    pub right_mu_before: f64,
    pub right_mu_after: f64,
    pub left_sigma_before: f64,
    pub left_sigma_after: f64,
    pub right_sigma_before: f64,
    pub right_sigma_after: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
