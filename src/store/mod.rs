//! The Rating Store: durable posteriors, the append-only choice log, and the
//! singleton AppState row, all behind one SQLite connection.

pub mod connection;
pub mod migrations;
pub mod repository;

pub use repository::{with_retry, AppStateRow};
