//! Orchestrator module - coordinates all components
//!
//! The orchestrator:
//! - Opens and migrates the event store
//! - Seeds the runtime settings from the file configuration
//! - Builds the probe stack and the scheduler
//! - Owns the background tasks (scheduler, retention, log journal) under a
//!   single cancellation token

#[cfg(test)]
mod tests;

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ConfigError};
use crate::database::{EventStore, EventStoreImpl, initialize_database};
use crate::diagnostics::{Diagnostics, SystemDiagnostics};
use crate::journal::{self, JournalReceiver};
use crate::monitoring::{HttpSpeedProbe, ModeProbe, Probe, RuntimeSettings, Scheduler, SimulatedProbe};
use crate::pool::open_pool;
use crate::retention::{RetentionCleanup, RetentionPolicy};

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct MonitorHandle {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn EventStore>,
    pub settings: RuntimeSettings,
    pub diagnostics: Arc<dyn Diagnostics>,
}

/// Main orchestrator for the linkwatch service
pub struct Orchestrator {
    config: Config,
    handle: MonitorHandle,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    task_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Orchestrator {
    /// Build every component from the configuration. Nothing runs until
    /// [`start`](Self::start).
    pub async fn new(config: Config) -> Result<Self> {
        info!("Opening database at {}", config.database.path);
        let pool = open_pool(&config.database.path, config.database.pool_size).await?;

        info!("Initializing database schema...");
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
        drop(conn);

        let store: Arc<dyn EventStore> = Arc::new(EventStoreImpl::new_from_pool(pool));

        let settings = RuntimeSettings::validated(config.monitor.runtime_config())
            .await
            .map_err(|rejected| ConfigError::Invalid { section: "monitor", rejected })?;

        let live: Arc<dyn Probe> = Arc::new(
            HttpSpeedProbe::new(&config.probe).map_err(|e| anyhow!("failed to build speed probe: {e}"))?,
        );
        let simulated: Arc<dyn Probe> = Arc::new(SimulatedProbe::new(config.probe.simulated_failure_rate));
        let probe: Arc<dyn Probe> = Arc::new(ModeProbe::new(live, simulated, settings.clone()));

        Ok(Self::from_parts(config, probe, store, settings, Arc::new(SystemClock)))
    }

    /// Assemble an orchestrator around already-built collaborators
    pub fn from_parts(
        config: Config,
        probe: Arc<dyn Probe>,
        store: Arc<dyn EventStore>,
        settings: RuntimeSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scheduler = Arc::new(
            Scheduler::new(probe, store.clone(), settings.clone(), clock.clone())
                .with_recovery_backoff(Duration::from_secs(config.monitor.recovery_backoff_seconds)),
        );
        let diagnostics: Arc<dyn Diagnostics> = Arc::new(SystemDiagnostics::new(&config.diagnostics));

        Self {
            handle: MonitorHandle { scheduler, store, settings, diagnostics },
            config,
            clock,
            cancel: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    /// Spawn the background tasks. `journal` is the receiving end of the
    /// [`JournalLayer`](crate::journal::JournalLayer) installed at startup.
    pub fn start(&mut self, journal: Option<JournalReceiver>) {
        info!("Starting linkwatch orchestrator...");

        if let Some(rx) = journal {
            self.task_handles.push(journal::spawn_writer(rx, self.handle.store.clone(), self.cancel.child_token()));
        }

        let policy = RetentionPolicy { log_days: self.config.retention.log_days };
        info!("Retention policy: logs={}d", policy.log_days);
        let cleanup = Arc::new(RetentionCleanup::new(self.handle.store.clone(), self.clock.clone(), policy));
        self.task_handles.push(cleanup.start_periodic_cleanup(
            Duration::from_secs(self.config.retention.sweep_interval_seconds.max(1)),
            self.cancel.child_token(),
        ));

        self.task_handles.push(self.handle.scheduler.spawn(self.cancel.child_token()));
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token cancelled by [`shutdown`](Self::shutdown)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every background task and wait for them to finish
    pub async fn shutdown(self) {
        info!("Shutting down linkwatch orchestrator...");
        self.cancel.cancel();

        for result in futures::future::join_all(self.task_handles).await {
            if let Err(e) = result {
                error!("Background task ended abnormally: {}", e);
            }
        }
        info!("Shutdown complete");
    }
}
