//! The Session Coordinator: the sole entry point for the outer layer, and
//! the sole holder of the write lock across a `read posteriors → select
//! pair → commit choice → bump round` sequence.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::catalog::{Catalog, ScanStats};
use crate::config::CoreConfig;
use crate::convergence::{self, Metrics};
use crate::digest::Digest;
use crate::error::{CoreError, Result};
use crate::pairing::selector;
use crate::rating::{engine, ChoiceRecord, Outcome};
use crate::session::state::SessionState;
use crate::store::{connection, migrations, repository, with_retry};

struct Inner {
    conn: Connection,
    state: SessionState,
    root_set: bool,
}

/// Serializes every state-mutating operation behind a single lock, so that
/// reading posteriors, selecting a pair, committing a choice, and bumping
/// the round counter are never interleaved with another writer. Read-only
/// catalog lookups bypass this lock entirely — they only touch the
/// catalog's own reader-writer lock.
pub struct SessionCoordinator {
    inner: Mutex<Inner>,
    catalog: Catalog,
    config: CoreConfig,
}

impl SessionCoordinator {
    pub fn open(db_path: &Path, config: CoreConfig) -> Result<Self> {
        Self::from_connection(connection::open(db_path)?, config)
    }

    pub fn open_in_memory(config: CoreConfig) -> Result<Self> {
        Self::from_connection(connection::open_in_memory()?, config)
    }

    fn from_connection(conn: Connection, config: CoreConfig) -> Result<Self> {
        migrations::run(&conn)?;
        let row = repository::load_app_state(&conn)?;
        let state = SessionState::from_row(&row)?;
        Ok(Self {
            inner: Mutex::new(Inner { conn, state, root_set: false }),
            catalog: Catalog::new(),
            config,
        })
    }

    /// Scan `root` into the catalog and seed a fresh posterior for every
    /// newly observed digest.
    pub fn set_root(&self, root: &Path) -> Result<ScanStats> {
        let (stats, new_images) = self.catalog.scan(root, &self.config, None)?;

        let mut inner = self.inner.lock();
        for new_image in &new_images {
            repository::insert_fresh_image(&inner.conn, &new_image.digest)?;
        }
        inner.root_set = true;
        Ok(stats)
    }

    /// Resolve a digest to its on-disk path. Read-only — does not take the
    /// coordinator's write lock.
    pub fn lookup(&self, digest: &Digest) -> Result<PathBuf> {
        self.catalog.lookup(digest)
    }

    /// Resolve a digest to its on-disk path and the MIME type sniffed from
    /// the catalog's recorded format, for `fetch_image`. Read-only — does not
    /// take the coordinator's write lock.
    pub fn fetch_image(&self, digest: &Digest) -> Result<(PathBuf, &'static str)> {
        let entry = self.catalog.lookup_entry(digest)?;
        Ok((entry.path, entry.format.mime()))
    }

    pub fn next_pair(&self) -> Result<(u64, Digest, Digest)> {
        let mut inner = self.inner.lock();
        if !inner.root_set {
            return Err(CoreError::NoDirectorySet);
        }

        let posteriors = repository::all_posteriors(&inner.conn)?;
        let recent_images: Vec<Digest> = inner.state.recent_images.iter().cloned().collect();
        let recent_pairs: Vec<(Digest, Digest)> = inner.state.recent_pairs.iter().cloned().collect();
        let current_round = inner.state.current_round;

        let mut rng = rand::thread_rng();
        let (left, right) = selector::select_pair(
            &posteriors,
            &recent_images,
            &recent_pairs,
            current_round,
            &self.config,
            &mut rng,
        )?;

        inner.state.push_recent_images(&[left.clone(), right.clone()], &self.config);
        inner.state.push_recent_pair(&left, &right, &self.config);
        inner.state.last_pair = Some((current_round, left.clone(), right.clone()));
        let row = inner.state.to_row();
        repository::save_app_state(&inner.conn, &row)?;

        Ok((current_round, left, right))
    }

    /// Commit a choice. Rejects a stale round, an unknown digest, or a pair
    /// that does not match the last `next_pair` result. On success, applies
    /// the rating update inside a single transaction and advances the round
    /// counter; a failed transaction leaves both posteriors and the round
    /// counter unchanged.
    pub fn record_choice(
        &self,
        round: u64,
        left: Digest,
        right: Digest,
        outcome: Outcome,
    ) -> Result<(bool, u64)> {
        let mut inner = self.inner.lock();
        if round != inner.state.current_round {
            return Err(CoreError::StaleRound { given: round, current: inner.state.current_round });
        }
        if left == right {
            return Err(CoreError::DigestMismatch);
        }
        if let Some((last_round, last_left, last_right)) = inner.state.last_pair.clone() {
            let is_same_pair = last_round == round
                && ((last_left == left && last_right == right) || (last_left == right && last_right == left));
            if !is_same_pair {
                return Err(CoreError::DigestMismatch);
            }
        }

        let config = &self.config;
        let mut rng = rand::thread_rng();
        let record = with_retry(config, || -> Result<ChoiceRecord> {
            let tx = inner.conn.transaction()?;
            let mut left_p = repository::get_posterior(&tx, &left)?;
            let mut right_p = repository::get_posterior(&tx, &right)?;

            let (left_mu_before, left_sigma_before) = (left_p.mu, left_p.sigma);
            let (right_mu_before, right_sigma_before) = (right_p.mu, right_p.sigma);

            engine::apply_outcome(&mut left_p, &mut right_p, outcome, round, config, &mut rng);

            repository::upsert_posterior(&tx, &left_p)?;
            repository::upsert_posterior(&tx, &right_p)?;

            let record = ChoiceRecord {
                round,
                left_digest: left.clone(),
                right_digest: right.clone(),
                outcome,
                left_mu_before,
                left_mu_after: left_p.mu,
                right_mu_before,
                right_mu_after: right_p.mu,
                left_sigma_before,
                left_sigma_after: left_p.sigma,
                right_sigma_before,
                right_sigma_after: right_p.sigma,
                timestamp: chrono::Utc::now(),
            };
            repository::insert_choice(&tx, &record)?;
            tx.commit()?;
            Ok(record)
        })?;

        inner.state.current_round += 1;
        inner.state.last_pair = None;

        let all = repository::all_posteriors(&inner.conn)?;
        let top_k: Vec<Digest> = convergence::rank(&all)
            .into_iter()
            .take(self.config.target_top_k)
            .map(|p| p.digest.clone())
            .collect();
        inner.state.push_top_k_snapshot(top_k, &self.config);

        let row = inner.state.to_row();
        repository::save_app_state(&inner.conn, &row)?;

        let _ = record;
        Ok((true, inner.state.current_round))
    }

    pub fn progress(&self) -> Result<Metrics> {
        let inner = self.inner.lock();
        let posteriors = repository::all_posteriors(&inner.conn)?;
        Ok(convergence::compute(&posteriors, &inner.state.top_k_history, &self.config))
    }

    /// Atomically clears all posteriors, the choice log, and AppState. The
    /// catalog (and its digest index) is unaffected.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        repository::reset_all(&inner.conn)?;
        inner.state.reset();
        let row = inner.state.to_row();
        repository::save_app_state(&inner.conn, &row)?;
        Ok(())
    }
}

/// Draw a `Posterior`'s initial state into the store for a digest the
/// catalog has not reported as new (used by replay/import tooling that
/// pre-populates posteriors outside a scan). Exposed for completeness; the
/// common path is `set_root`.
pub fn seed_if_absent(conn: &Connection, digest: &Digest) -> Result<()> {
    repository::insert_fresh_image(conn, digest)
}
