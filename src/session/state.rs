//! In-memory session state: the round counter and the bounded recency ring
//! buffers the Pairing Engine and Convergence Detector read. Persisted as a
//! single JSON-serialized row in the `app_state` table so a process restart
//! resumes exactly where it left off.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::digest::{unordered_pair, Digest};
use crate::error::Result;
use crate::store::AppStateRow;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PairWire(Digest, Digest);

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub current_round: u64,
    pub recent_images: VecDeque<Digest>,
    pub recent_pairs: VecDeque<(Digest, Digest)>,
    pub top_k_history: VecDeque<Vec<Digest>>,
    pub last_pair: Option<(u64, Digest, Digest)>,
}

impl SessionState {
    pub fn from_row(row: &AppStateRow) -> Result<Self> {
        let recent_images: VecDeque<Digest> = serde_json::from_str(&row.recent_images_json)
            .map_err(|e| crate::error::CoreError::ConfigParse { details: e.to_string() })?;
        let recent_pairs_wire: VecDeque<PairWire> = serde_json::from_str(&row.recent_pairs_json)
            .map_err(|e| crate::error::CoreError::ConfigParse { details: e.to_string() })?;
        let top_k_history: VecDeque<Vec<Digest>> = serde_json::from_str(&row.top_k_history_json)
            .map_err(|e| crate::error::CoreError::ConfigParse { details: e.to_string() })?;
        Ok(Self {
            current_round: row.current_round,
            recent_images,
            recent_pairs: recent_pairs_wire.into_iter().map(|w| (w.0, w.1)).collect(),
            top_k_history,
            last_pair: None,
        })
    }

    #[must_use]
    pub fn to_row(&self) -> AppStateRow {
        let pairs_wire: VecDeque<PairWire> =
            self.recent_pairs.iter().map(|(a, b)| PairWire(a.clone(), b.clone())).collect();
        AppStateRow {
            current_round: self.current_round,
            recent_images_json: serde_json::to_string(&self.recent_images).unwrap_or_else(|_| "[]".into()),
            recent_pairs_json: serde_json::to_string(&pairs_wire).unwrap_or_else(|_| "[]".into()),
            top_k_history_json: serde_json::to_string(&self.top_k_history).unwrap_or_else(|_| "[]".into()),
        }
    }

    pub fn push_recent_images(&mut self, digests: &[Digest], config: &CoreConfig) {
        for d in digests {
            self.recent_images.push_back(d.clone());
        }
        while self.recent_images.len() > config.recent_images_window {
            self.recent_images.pop_front();
        }
    }

    /// Stored in canonical (lexicographically sorted) order so membership
    /// checks against an unordered pair never miss a stored entry depending
    /// on which side `left`/`right` happened to be drawn into.
    pub fn push_recent_pair(&mut self, left: &Digest, right: &Digest, config: &CoreConfig) {
        self.recent_pairs.push_back(unordered_pair(left, right));
        while self.recent_pairs.len() > config.recent_pairs_window {
            self.recent_pairs.pop_front();
        }
    }

    pub fn push_top_k_snapshot(&mut self, snapshot: Vec<Digest>, config: &CoreConfig) {
        self.top_k_history.push_back(snapshot);
        while self.top_k_history.len() > config.stability_window {
            self.top_k_history.pop_front();
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trips_through_json() {
        let mut state = SessionState::default();
        state.current_round = 7;
        let config = CoreConfig::default();
        state.push_recent_images(&[Digest::unchecked("a".repeat(64))], &config);
        state.push_recent_pair(&Digest::unchecked("a".repeat(64)), &Digest::unchecked("b".repeat(64)), &config);
        state.push_top_k_snapshot(vec![Digest::unchecked("a".repeat(64))], &config);

        let row = state.to_row();
        let restored = SessionState::from_row(&row).unwrap();
        assert_eq!(restored.current_round, 7);
        assert_eq!(restored.recent_images.len(), 1);
        assert_eq!(restored.recent_pairs.len(), 1);
        assert_eq!(restored.top_k_history.len(), 1);
    }

    #[test]
    fn recent_images_window_is_bounded() {
        let mut state = SessionState::default();
        let config = CoreConfig { recent_images_window: 2, ..CoreConfig::default() };
        for n in 0..5u8 {
            state.push_recent_images(&[Digest::unchecked(format!("{n:02x}").repeat(32))], &config);
        }
        assert_eq!(state.recent_images.len(), 2);
    }

    #[test]
    fn recent_pairs_window_is_bounded() {
        let mut state = SessionState::default();
        let config = CoreConfig { recent_pairs_window: 1, ..CoreConfig::default() };
        state.push_recent_pair(&Digest::unchecked("a".repeat(64)), &Digest::unchecked("b".repeat(64)), &config);
        state.push_recent_pair(&Digest::unchecked("c".repeat(64)), &Digest::unchecked("d".repeat(64)), &config);
        assert_eq!(state.recent_pairs.len(), 1);
    }
}
