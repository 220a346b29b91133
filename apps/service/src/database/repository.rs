use async_trait::async_trait;
use libsql::params;

use super::models::{LogEntry, LogLevel};
use crate::error::StoreError;
use crate::monitoring::types::{OutageInterval, Sample};
use crate::pool::LibsqlPool;

/// Logical operations the monitor needs from persistence.
///
/// Every write is a single statement, so concurrent readers only ever see
/// complete rows. Reads return newest first; rows sharing a timestamp come
/// back in reverse insertion order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a measurement sample
    async fn save_sample(&self, sample: &Sample) -> Result<i64, StoreError>;

    /// Append a closed outage interval
    async fn save_outage(&self, outage: &OutageInterval) -> Result<i64, StoreError>;

    /// Append a log entry
    async fn save_log(&self, entry: &LogEntry) -> Result<i64, StoreError>;

    /// Most recent samples, newest first
    async fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>, StoreError>;

    /// Most recent outage intervals by start time, newest first
    async fn recent_outages(&self, limit: usize) -> Result<Vec<OutageInterval>, StoreError>;

    /// Most recent log entries, newest first
    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>, StoreError>;

    /// Newest sample, if any
    async fn latest_sample(&self) -> Result<Option<Sample>, StoreError> {
        Ok(self.recent_samples(1).await?.into_iter().next())
    }

    /// Delete log entries older than `before`; returns the number removed
    async fn prune_logs(&self, before: i64) -> Result<u64, StoreError>;

    /// Check the store is reachable
    async fn status(&self) -> Result<(), StoreError>;
}

/// LibSQL event store implementation
pub struct EventStoreImpl {
    pool: LibsqlPool,
}

impl EventStoreImpl {
    /// Create a new event store from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>, StoreError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl EventStore for EventStoreImpl {
    async fn save_sample(&self, sample: &Sample) -> Result<i64, StoreError> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO samples (timestamp, download, upload, latency) VALUES (?, ?, ?, ?)",
            params![sample.timestamp, sample.download, sample.upload, sample.latency],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn save_outage(&self, outage: &OutageInterval) -> Result<i64, StoreError> {
        let Some(end_time) = outage.end_time else {
            return Err(StoreError::InvalidRecord(format!(
                "outage starting at {} is still open",
                outage.start_time
            )));
        };

        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO outages (start_time, end_time) VALUES (?, ?)",
            params![outage.start_time, end_time],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn save_log(&self, entry: &LogEntry) -> Result<i64, StoreError> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO logs (timestamp, level, message) VALUES (?, ?, ?)",
            params![entry.timestamp, entry.level.to_string(), entry.message.clone()],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>, StoreError> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT timestamp, download, upload, latency FROM samples ORDER BY timestamp DESC, id DESC LIMIT ?")
            .await?;

        let mut rows = stmt.query(params![limit as i64]).await?;
        let mut samples = Vec::new();

        while let Some(row) = rows.next().await? {
            samples.push(Sample {
                timestamp: row.get(0)?,
                download: row.get(1)?,
                upload: row.get(2)?,
                latency: row.get(3)?,
            });
        }

        Ok(samples)
    }

    async fn recent_outages(&self, limit: usize) -> Result<Vec<OutageInterval>, StoreError> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT start_time, end_time FROM outages ORDER BY start_time DESC, id DESC LIMIT ?")
            .await?;

        let mut rows = stmt.query(params![limit as i64]).await?;
        let mut outages = Vec::new();

        while let Some(row) = rows.next().await? {
            outages.push(OutageInterval {
                start_time: row.get(0)?,
                end_time: Some(row.get(1)?),
            });
        }

        Ok(outages)
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT timestamp, level, message FROM logs ORDER BY timestamp DESC, id DESC LIMIT ?")
            .await?;

        let mut rows = stmt.query(params![limit as i64]).await?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next().await? {
            let level_str: String = row.get(1)?;
            let level = LogLevel::parse(&level_str)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown log level '{level_str}'")))?;

            entries.push(LogEntry {
                timestamp: row.get(0)?,
                level,
                message: row.get(2)?,
            });
        }

        Ok(entries)
    }

    async fn prune_logs(&self, before: i64) -> Result<u64, StoreError> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM logs WHERE timestamp < ?", params![before])
            .await?;
        Ok(deleted)
    }

    async fn status(&self) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        conn.query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(libsql::Error::QueryReturnedNoRows)?;
        Ok(())
    }
}
