//! Schema bootstrap. Not a migration chain — there is no prior shipped
//! schema to migrate from, so every table is created in one idempotent
//! batch. If this crate ever needs to evolve a shipped schema, replace this
//! with a real versioned migration runner; until then a flat `CREATE TABLE
//! IF NOT EXISTS` block is simpler and just as correct.

use rusqlite::Connection;

use crate::error::Result;

const SCHEMA_VERSION: u32 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS images (
            digest              TEXT PRIMARY KEY,
            mu                  REAL NOT NULL,
            sigma               REAL NOT NULL,
            exposures           INTEGER NOT NULL DEFAULT 0,
            likes               INTEGER NOT NULL DEFAULT 0,
            unlikes             INTEGER NOT NULL DEFAULT 0,
            skips               INTEGER NOT NULL DEFAULT 0,
            last_seen_round     INTEGER NOT NULL DEFAULT 0,
            next_eligible_round INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS choices (
            round              INTEGER PRIMARY KEY,
            left_digest        TEXT NOT NULL REFERENCES images(digest),
            right_digest       TEXT NOT NULL REFERENCES images(digest),
            outcome            TEXT NOT NULL,
            left_mu_before     REAL NOT NULL,
            left_mu_after      REAL NOT NULL,
            right_mu_before    REAL NOT NULL,
            right_mu_after     REAL NOT NULL,
            left_sigma_before  REAL NOT NULL,
            left_sigma_after   REAL NOT NULL,
            right_sigma_before REAL NOT NULL,
            right_sigma_after  REAL NOT NULL,
            timestamp          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_state (
            id              INTEGER PRIMARY KEY CHECK (id = 1),
            current_round   INTEGER NOT NULL DEFAULT 0,
            recent_images   TEXT NOT NULL DEFAULT '[]',
            recent_pairs    TEXT NOT NULL DEFAULT '[]',
            top_k_history   TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_images_exposures ON images(exposures);
        CREATE INDEX IF NOT EXISTS idx_images_next_eligible ON images(next_eligible_round);
        CREATE INDEX IF NOT EXISTS idx_choices_timestamp ON choices(timestamp);

        INSERT INTO schema_version SELECT 0
            WHERE NOT EXISTS (SELECT 1 FROM schema_version);
        UPDATE schema_version SET version = 1 WHERE version < 1;

        INSERT OR IGNORE INTO app_state (id, current_round) VALUES (1, 0);
        ",
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?;
    Ok(version)
}
