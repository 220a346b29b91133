//! Automatic retention and cleanup of journaled log entries.
//!
//! Samples and outage intervals are history and are never pruned; only the
//! log journal is swept, periodically, as a background task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::database::EventStore;
use crate::error::StoreError;

/// Retention policy for journaled logs
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep log entries
    pub log_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { log_days: 30 }
    }
}

impl RetentionPolicy {
    /// `None` when the policy keeps logs forever (non-positive days)
    fn log_retention_seconds(&self) -> Option<i64> {
        (self.log_days > 0).then(|| self.log_days.saturating_mul(24 * 3600))
    }
}

/// Cleanup manager for expired log entries
pub struct RetentionCleanup {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, policy: RetentionPolicy) -> Self {
        Self { store, clock, policy }
    }

    /// Delete log entries older than the policy allows
    pub async fn cleanup_expired_logs(&self) -> Result<u64, StoreError> {
        let Some(retention) = self.policy.log_retention_seconds() else {
            debug!("Log retention disabled (log_days = {})", self.policy.log_days);
            return Ok(0);
        };

        let cutoff = self.clock.now().saturating_sub(retention);
        debug!(
            "Cleaning up logs (older than {} days, cutoff: {})",
            self.policy.log_days, cutoff
        );

        let deleted = self.store.prune_logs(cutoff).await?;
        info!("Retention cleanup completed: {} log entries deleted", deleted);
        Ok(deleted)
    }

    /// Run the sweep every `every` until cancelled
    pub fn start_periodic_cleanup(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.cleanup_expired_logs().await {
                    warn!("Retention cleanup failed: {}", e);
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = self.clock.sleep(every) => {}
                }
            }
            debug!("Retention cleanup stopped");
        })
    }
}
