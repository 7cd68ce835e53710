//! CRUD for the three logical tables: `images` (posteriors), `choices`
//! (the append-only log), and the singleton `app_state` row.

use std::str::FromStr;
use std::thread;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::CoreConfig;
use crate::digest::Digest;
use crate::error::{CoreError, Result};
use crate::rating::{ChoiceRecord, Outcome, Posterior};

/// Execute a prepared statement, collect all rows with `f`, and return a Vec.
fn collect_rows<T, F>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    f: F,
) -> Result<Vec<T>>
where
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
}

fn posterior_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Posterior> {
    let digest_str: String = row.get(0)?;
    let digest = Digest::from_str(&digest_str)
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, "digest".into(), rusqlite::types::Type::Text))?;
    let created_at_str: String = row.get(9)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| rusqlite::Error::InvalidColumnType(9, "created_at".into(), rusqlite::types::Type::Text))?;
    Ok(Posterior {
        digest,
        mu: row.get(1)?,
        sigma: row.get(2)?,
        exposures: row.get(3)?,
        likes: row.get(4)?,
        unlikes: row.get(5)?,
        skips: row.get(6)?,
        last_seen_round: row.get(7)?,
        next_eligible_round: row.get(8)?,
        created_at,
    })
}

const POSTERIOR_COLUMNS: &str =
    "digest, mu, sigma, exposures, likes, unlikes, skips, last_seen_round, next_eligible_round, created_at";

/// Insert a fresh posterior for a newly observed digest. No-op if it already exists.
pub fn insert_fresh_image(conn: &Connection, digest: &Digest) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO images (digest, mu, sigma, created_at) VALUES (?1, 1500.0, 350.0, ?2)",
        params![digest.as_str(), now],
    )?;
    Ok(())
}

/// Fetch a single posterior by digest.
pub fn get_posterior(conn: &Connection, digest: &Digest) -> Result<Posterior> {
    let sql = format!("SELECT {POSTERIOR_COLUMNS} FROM images WHERE digest = ?1");
    conn.query_row(&sql, params![digest.as_str()], posterior_from_row)
        .optional()?
        .ok_or(CoreError::UnknownDigest)
}

/// Fetch every posterior currently known.
pub fn all_posteriors(conn: &Connection) -> Result<Vec<Posterior>> {
    let sql = format!("SELECT {POSTERIOR_COLUMNS} FROM images");
    collect_rows(conn, &sql, [], posterior_from_row)
}

/// Overwrite a posterior's mutable fields after a rating update.
pub fn upsert_posterior(conn: &Connection, p: &Posterior) -> Result<()> {
    conn.execute(
        "UPDATE images SET mu = ?1, sigma = ?2, exposures = ?3, likes = ?4, unlikes = ?5,
            skips = ?6, last_seen_round = ?7, next_eligible_round = ?8
         WHERE digest = ?9",
        params![
            p.mu,
            p.sigma,
            p.exposures,
            p.likes,
            p.unlikes,
            p.skips,
            p.last_seen_round,
            p.next_eligible_round,
            p.digest.as_str(),
        ],
    )?;
    Ok(())
}

/// Append a choice record to the immutable log.
pub fn insert_choice(conn: &Connection, c: &ChoiceRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO choices (
            round, left_digest, right_digest, outcome,
            left_mu_before, left_mu_after, right_mu_before, right_mu_after,
            left_sigma_before, left_sigma_after, right_sigma_before, right_sigma_after,
            timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            c.round,
            c.left_digest.as_str(),
            c.right_digest.as_str(),
            c.outcome.as_str(),
            c.left_mu_before,
            c.left_mu_after,
            c.right_mu_before,
            c.right_mu_after,
            c.left_sigma_before,
            c.left_sigma_after,
            c.right_sigma_before,
            c.right_sigma_after,
            c.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Ordered replay log, used by the idempotence test and potential offline audit.
pub fn all_choices(conn: &Connection) -> Result<Vec<ChoiceRecord>> {
    collect_rows(
        conn,
        "SELECT round, left_digest, right_digest, outcome,
                left_mu_before, left_mu_after, right_mu_before, right_mu_after,
                left_sigma_before, left_sigma_after, right_sigma_before, right_sigma_after,
                timestamp
         FROM choices ORDER BY round ASC",
        [],
        |row| {
            let left_digest: String = row.get(1)?;
            let right_digest: String = row.get(2)?;
            let outcome_str: String = row.get(3)?;
            let timestamp_str: String = row.get(12)?;
            Ok(ChoiceRecord {
                round: row.get(0)?,
                left_digest: Digest::from_str(&left_digest).unwrap_or_else(|_| Digest::from_str(&"0".repeat(64)).unwrap()),
                right_digest: Digest::from_str(&right_digest).unwrap_or_else(|_| Digest::from_str(&"0".repeat(64)).unwrap()),
                outcome: Outcome::from_str(&outcome_str).unwrap_or(Outcome::Skip),
                left_mu_before: row.get(4)?,
                left_mu_after: row.get(5)?,
                right_mu_before: row.get(6)?,
                right_mu_after: row.get(7)?,
                left_sigma_before: row.get(8)?,
                left_sigma_after: row.get(9)?,
                right_sigma_before: row.get(10)?,
                right_sigma_after: row.get(11)?,
                timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp_str)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(|_| chrono::Utc::now()),
            })
        },
    )
}

/// Raw AppState row: the round counter plus the three ring buffers, each
/// serialized as JSON so a single row can hold all of them.
pub struct AppStateRow {
    pub current_round: u64,
    pub recent_images_json: String,
    pub recent_pairs_json: String,
    pub top_k_history_json: String,
}

pub fn load_app_state(conn: &Connection) -> Result<AppStateRow> {
    conn.query_row(
        "SELECT current_round, recent_images, recent_pairs, top_k_history FROM app_state WHERE id = 1",
        [],
        |row| {
            Ok(AppStateRow {
                current_round: row.get(0)?,
                recent_images_json: row.get(1)?,
                recent_pairs_json: row.get(2)?,
                top_k_history_json: row.get(3)?,
            })
        },
    )
    .map_err(CoreError::from)
}

pub fn save_app_state(conn: &Connection, state: &AppStateRow) -> Result<()> {
    conn.execute(
        "UPDATE app_state SET current_round = ?1, recent_images = ?2, recent_pairs = ?3, top_k_history = ?4
         WHERE id = 1",
        params![
            state.current_round,
            state.recent_images_json,
            state.recent_pairs_json,
            state.top_k_history_json,
        ],
    )?;
    Ok(())
}

/// Wipe all image posteriors, the choice log, and AppState back to the
/// empty starting point. The catalog (outside this database) is untouched.
pub fn reset_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM choices;
         DELETE FROM images;
         UPDATE app_state SET current_round = 0, recent_images = '[]', recent_pairs = '[]', top_k_history = '[]'
             WHERE id = 1;",
    )?;
    Ok(())
}

/// Retry a fallible DB operation with exponential backoff, per the transient-error
/// propagation policy: up to `config.db_retry_attempts` attempts before surfacing
/// the last error to the caller.
pub fn with_retry<T>(config: &CoreConfig, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < config.db_retry_attempts => {
                let backoff_ms = 10u64 * 2u64.pow(attempt);
                tracing::warn!("transient store error (attempt {}): {}", attempt + 1, e);
                thread::sleep(Duration::from_millis(backoff_ms));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{connection, migrations};

    fn db() -> Connection {
        let conn = connection::open_in_memory().unwrap();
        migrations::run(&conn).unwrap();
        conn
    }

    fn digest(n: u8) -> Digest {
        Digest::unchecked(format!("{n:02x}").repeat(32))
    }

    #[test]
    fn insert_fresh_image_seeds_default_posterior() {
        let conn = db();
        let d = digest(1);
        insert_fresh_image(&conn, &d).unwrap();
        let p = get_posterior(&conn, &d).unwrap();
        assert_eq!(p.mu, 1500.0);
        assert_eq!(p.sigma, 350.0);
        assert_eq!(p.exposures, 0);
    }

    #[test]
    fn insert_fresh_image_is_idempotent() {
        let conn = db();
        let d = digest(2);
        insert_fresh_image(&conn, &d).unwrap();
        insert_fresh_image(&conn, &d).unwrap();
        let all = all_posteriors(&conn).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn insert_fresh_image_records_a_readable_created_at() {
        let conn = db();
        let d = digest(5);
        insert_fresh_image(&conn, &d).unwrap();
        let p = get_posterior(&conn, &d).unwrap();
        assert!(p.created_at <= chrono::Utc::now());
    }

    #[test]
    fn unknown_digest_lookup_errors() {
        let conn = db();
        let err = get_posterior(&conn, &digest(9)).unwrap_err();
        assert_eq!(err.tag(), "UnknownDigest");
    }

    #[test]
    fn upsert_posterior_round_trips() {
        let conn = db();
        let d = digest(3);
        insert_fresh_image(&conn, &d).unwrap();
        let mut p = get_posterior(&conn, &d).unwrap();
        p.mu = 1512.0;
        p.sigma = 339.5;
        p.exposures = 1;
        p.likes = 1;
        upsert_posterior(&conn, &p).unwrap();

        let reloaded = get_posterior(&conn, &d).unwrap();
        assert_eq!(reloaded.mu, 1512.0);
        assert_eq!(reloaded.exposures, 1);
        assert_eq!(reloaded.likes, 1);
    }

    #[test]
    fn app_state_defaults_to_round_zero_and_round_trips() {
        let conn = db();
        let state = load_app_state(&conn).unwrap();
        assert_eq!(state.current_round, 0);

        let updated = AppStateRow {
            current_round: 5,
            recent_images_json: "[\"a\"]".into(),
            recent_pairs_json: "[]".into(),
            top_k_history_json: "[]".into(),
        };
        save_app_state(&conn, &updated).unwrap();
        let reloaded = load_app_state(&conn).unwrap();
        assert_eq!(reloaded.current_round, 5);
        assert_eq!(reloaded.recent_images_json, "[\"a\"]");
    }

    #[test]
    fn reset_all_clears_images_choices_and_app_state() {
        let conn = db();
        let d = digest(4);
        insert_fresh_image(&conn, &d).unwrap();
        save_app_state(
            &conn,
            &AppStateRow {
                current_round: 3,
                recent_images_json: "[]".into(),
                recent_pairs_json: "[]".into(),
                top_k_history_json: "[]".into(),
            },
        )
        .unwrap();

        reset_all(&conn).unwrap();

        assert!(all_posteriors(&conn).unwrap().is_empty());
        assert_eq!(load_app_state(&conn).unwrap().current_round, 0);
    }

    #[test]
    fn with_retry_gives_up_after_configured_attempts() {
        let config = CoreConfig { db_retry_attempts: 2, ..CoreConfig::default() };
        let mut calls = 0;
        let result: Result<()> = with_retry(&config, || {
            calls += 1;
            Err(CoreError::Sql { context: "test", details: "locked".into() })
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn with_retry_does_not_retry_non_transient_errors() {
        let config = CoreConfig::default();
        let mut calls = 0;
        let result: Result<()> = with_retry(&config, || {
            calls += 1;
            Err(CoreError::NotEnoughImages)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
