pub mod migrations;
pub mod queries;

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use rusqlite::Connection;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    // journal_mode returns a row, so it cannot go through execute_batch.
    let _mode: String = conn
        .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
        .context("failed to set journal mode")?;
    conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=2000;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// A panic while holding the connection leaves SQLite itself consistent, so a
/// poisoned lock is recovered rather than propagated.
pub fn lock(db: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}
