pub mod migrations;
pub mod queries;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::Connection;

/// Opens the context and booking store and brings its schema up to date.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("failed to open database at {path}"))?;

    // In-memory databases report "memory" for journal_mode.
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// One connection shared by the booking repository and every session's context.
pub fn open_shared(path: &str) -> anyhow::Result<Arc<Mutex<Connection>>> {
    let conn = init_db(path)?;
    tracing::info!(path, "database ready");
    Ok(Arc::new(Mutex::new(conn)))
}
