//! SQLite connection setup: WAL journaling and a busy timeout so concurrent
//! readers never fail outright on a writer holding the lock.

use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

const BUSY_TIMEOUT_MS: u32 = 5000;

/// Open (creating if necessary) the rating store database at `path`.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a private in-memory database, for tests and ephemeral sessions.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={BUSY_TIMEOUT_MS};"
    ))?;
    Ok(())
}
