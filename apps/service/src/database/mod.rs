/// Event store
///
/// Append-mostly persistence for samples, outage intervals and log entries,
/// backed by a local LibSQL (SQLite) database.

pub mod repository;
pub mod migrations;
pub mod models;

pub use models::{LogEntry, LogLevel};
pub use repository::{EventStore, EventStoreImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
