//! Convergence metrics computed from the current posterior ranking and the
//! top-K history ring buffer.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::digest::Digest;
use crate::rating::Posterior;

const CONFIDENCE_Z: f64 = 1.96;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub progress: f64,
    pub portfolio_ready: bool,
    pub quality: &'static str,
    pub coverage: f64,
    pub confidence: f64,
    pub boundary_gap: f64,
    pub stability: f64,
}

impl Metrics {
    /// The metrics for an empty catalog, or a non-empty one where every image still
    /// has zero exposures. An earlier implementation of this scheme reported
    /// `P ≈ 40` here; that was a bug — there is no basis for any progress claim
    /// with zero observations.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            progress: 0.0,
            portfolio_ready: false,
            quality: "early",
            coverage: 0.0,
            confidence: 0.0,
            boundary_gap: 0.0,
            stability: 0.0,
        }
    }
}

/// Sort posteriors by `μ` descending, tie-broken by lower `σ` then lower digest.
#[must_use]
pub fn rank(posteriors: &[Posterior]) -> Vec<&Posterior> {
    let mut ranked: Vec<&Posterior> = posteriors.iter().collect();
    ranked.sort_by(|a, b| {
        b.mu.partial_cmp(&a.mu)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.sigma.partial_cmp(&b.sigma).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.digest.cmp(&b.digest))
    });
    ranked
}

fn confidence_interval(p: &Posterior) -> (f64, f64) {
    let half = CONFIDENCE_Z * p.sigma;
    (p.mu - half, p.mu + half)
}

/// Compute the full metrics snapshot. `top_k_history` holds the most recent
/// top-K digest rankings, oldest first, bounded by `config.stability_window`.
#[must_use]
pub fn compute(
    posteriors: &[Posterior],
    top_k_history: &VecDeque<Vec<Digest>>,
    config: &CoreConfig,
) -> Metrics {
    if posteriors.is_empty() || posteriors.iter().all(|p| p.exposures == 0) {
        return Metrics::empty();
    }

    let ranked = rank(posteriors);
    let k = config.target_top_k.min(ranked.len());
    let top_k = &ranked[..k];

    let coverage = posteriors.iter().filter(|p| p.exposures >= config.min_exposures_per_image).count() as f64
        / posteriors.len() as f64;

    let confidence = if top_k.is_empty() {
        0.0
    } else {
        top_k.iter().filter(|p| p.sigma <= config.sigma_confident_max).count() as f64 / top_k.len() as f64
    };

    let boundary_gap = if ranked.len() > k {
        let (lower_k, _) = confidence_interval(ranked[k - 1]);
        let (_, upper_k_plus_1) = confidence_interval(ranked[k]);
        lower_k - upper_k_plus_1
    } else {
        0.0
    };

    let stability = compute_stability(top_k_history, config.stability_window);

    let mean_exposures = posteriors.iter().map(|p| f64::from(p.exposures)).sum::<f64>() / posteriors.len() as f64;
    let exposure_term = (mean_exposures / config.target_exposures).min(1.0);

    let progress_fraction =
        (0.30 * coverage + 0.25 * exposure_term + 0.25 * confidence + 0.20 * stability).clamp(0.0, 1.0);
    let progress = (progress_fraction * 100.0).clamp(0.0, 100.0);

    let portfolio_ready =
        coverage >= 0.95 && confidence >= 0.90 && boundary_gap > 0.0 && stability >= 0.95;

    Metrics {
        progress,
        portfolio_ready,
        quality: quality_label(progress),
        coverage,
        confidence,
        boundary_gap,
        stability,
    }
}

fn quality_label(progress: f64) -> &'static str {
    if progress >= 90.0 {
        "excellent"
    } else if progress >= 75.0 {
        "very good"
    } else if progress >= 50.0 {
        "good"
    } else if progress >= 25.0 {
        "fair"
    } else {
        "early"
    }
}

/// `1 − swaps / max_swaps` over consecutive snapshot pairs in the window.
/// `swaps` counts digests that entered or left the top-K set between two
/// consecutive snapshots; `max_swaps` is the worst case (total turnover)
/// for the same number of pairs. With fewer than two snapshots there is
/// nothing to compare, so stability defaults to fully stable.
fn compute_stability(top_k_history: &VecDeque<Vec<Digest>>, window: usize) -> f64 {
    let recent: Vec<&Vec<Digest>> = top_k_history.iter().rev().take(window).collect();
    if recent.len() < 2 {
        return 1.0;
    }

    let mut total_swaps = 0usize;
    let mut max_swaps = 0usize;
    for pair in recent.windows(2) {
        let (newer, older) = (pair[0], pair[1]);
        let newer_set: HashSet<&Digest> = newer.iter().collect();
        let older_set: HashSet<&Digest> = older.iter().collect();
        let entered = newer_set.difference(&older_set).count();
        let left = older_set.difference(&newer_set).count();
        total_swaps += entered + left;
        max_swaps += 2 * older.len().max(newer.len());
    }

    if max_swaps == 0 {
        1.0
    } else {
        (1.0 - total_swaps as f64 / max_swaps as f64).clamp(0.0, 1.0)
    }
}
