/// Integration tests for the orchestrator
///
/// These tests verify end-to-end wiring of:
/// - Store bootstrap (open -> migrate)
/// - Background tasks (scheduler, journal writer) and their shutdown
use crate::clock::ManualClock;
use crate::config::Config;
use crate::database::{LogEntry, LogLevel};
use crate::monitoring::{RuntimeConfig, RuntimeSettings};
use crate::orchestrator::Orchestrator;
use crate::testing::{MemoryStore, ScriptedProbe};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Helper to build a config pointing at a throwaway database
fn test_config(db_path: &str) -> Config {
    let mut config = Config::default();
    config.database.path = db_path.to_string();
    config.monitor.test_mode = true;
    config
}

#[tokio::test]
async fn test_new_bootstraps_store_and_settings() -> Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("orchestrator.db");
    let orchestrator = Orchestrator::new(test_config(&db_path.to_string_lossy())).await?;

    let handle = orchestrator.handle();
    handle.store.status().await?;
    assert!(handle.store.recent_samples(100).await?.is_empty());
    assert!(handle.settings.get().await.test_mode);
    assert!(!handle.scheduler.is_running());
    Ok(())
}

#[tokio::test]
async fn test_new_rejects_invalid_monitor_settings() -> Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("orchestrator.db");
    let mut config = test_config(&db_path.to_string_lossy());
    config.monitor.diagnostic_target = String::new();

    let err = Orchestrator::new(config).await.err().expect("empty target must be rejected");
    assert!(err.to_string().contains("diagnostic_target"));
    Ok(())
}

#[tokio::test]
async fn test_start_and_shutdown() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let settings = RuntimeSettings::new(RuntimeConfig::default());
    let mut orchestrator = Orchestrator::from_parts(
        Config::default(),
        Arc::new(ScriptedProbe::always_succeeding()),
        store.clone(),
        settings,
        Arc::new(ManualClock::new(0)),
    );

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(LogEntry::new(5, LogLevel::Info, "journaled"))?;
    orchestrator.start(Some(rx));

    let handle = orchestrator.handle();
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.samples().is_empty() || store.logs().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await?;

    orchestrator.shutdown().await;
    assert!(!handle.scheduler.is_running());
    assert!(store.logs().iter().any(|entry| entry.message == "journaled"));
    Ok(())
}
