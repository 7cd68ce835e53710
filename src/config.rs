//! Tunable parameters, all with defaults matching the parameter table.
//!
//! Every field can be overridden from a TOML file or set programmatically;
//! none require a schema migration to change.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All tunables for the rating, pairing, and convergence engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Probability of a uniformly random partner in pairing step (4).
    pub epsilon_greedy: f64,
    /// Probability of pulling slot A from `SKIPPED_ELIGIBLE` in step (2).
    pub skip_inject_probability: f64,
    /// Inclusive lower bound for the skip-cooldown round delta.
    pub skip_cooldown_min: u64,
    /// Inclusive upper bound for the skip-cooldown round delta.
    pub skip_cooldown_max: u64,
    /// Size of the recency suppression buffer (images).
    pub recent_images_window: usize,
    /// Size of the pair-recency suppression buffer.
    pub recent_pairs_window: usize,
    /// Size of the high-sigma shortlist for the info-theoretic partner search.
    pub shortlist_k: usize,
    /// Initial posterior uncertainty for a newly observed image.
    pub sigma_initial: f64,
    /// Floor below which posterior uncertainty never decays.
    pub sigma_min: f64,
    /// Multiplicative decay applied to sigma on a rated (non-skip) exposure.
    pub sigma_decay: f64,
    /// K for top-K stability and the convergence snapshot.
    pub target_top_k: usize,
    /// Minimum exposures per image for the coverage metric.
    pub min_exposures_per_image: u32,
    /// Sigma threshold below which a top-K image counts as confident.
    pub sigma_confident_max: f64,
    /// Rounds of top-K history retained for the stability metric.
    pub stability_window: usize,
    /// Catalog guard: maximum number of files a scan may discover.
    pub max_files: usize,
    /// Catalog guard: maximum size of a single file, in bytes.
    pub max_file_bytes: u64,
    /// Number of worker threads used to hash files during a scan.
    pub hash_workers: usize,
    /// Target mean exposures used by the convergence `exposure_term`.
    pub target_exposures: f64,
    /// Number of retries for a transient DB error before surfacing `Conflict`.
    pub db_retry_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            epsilon_greedy: 0.10,
            skip_inject_probability: 0.30,
            skip_cooldown_min: 11,
            skip_cooldown_max: 49,
            recent_images_window: 64,
            recent_pairs_window: 128,
            shortlist_k: 64,
            sigma_initial: 350.0,
            sigma_min: 60.0,
            sigma_decay: 0.97,
            target_top_k: 40,
            min_exposures_per_image: 5,
            sigma_confident_max: 90.0,
            stability_window: 120,
            max_files: 200_000,
            max_file_bytes: 250 * 1024 * 1024,
            hash_workers: 4,
            target_exposures: 10.0,
            db_retry_attempts: 3,
        }
    }
}

impl CoreConfig {
    /// Parse a config from TOML text, falling back to defaults for missing fields.
    pub fn from_toml(text: &str) -> Result<Self, CoreError> {
        toml::from_str(text).map_err(CoreError::from)
    }
}
