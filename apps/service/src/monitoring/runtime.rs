//! Process-wide settings read by the scheduler at the top of every cycle and
//! updated from request handlers.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::FieldRejection;
use crate::validation::{validate_host, validate_interval};

pub const DEFAULT_SAMPLE_INTERVAL_SECONDS: u64 = 3600;
pub const DEFAULT_DIAGNOSTIC_TARGET: &str = "google.com";

/// Snapshot of the mutable runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub sample_interval_seconds: u64,
    pub diagnostic_target: String,
    pub test_mode: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sample_interval_seconds: DEFAULT_SAMPLE_INTERVAL_SECONDS,
            diagnostic_target: DEFAULT_DIAGNOSTIC_TARGET.to_string(),
            test_mode: false,
        }
    }
}

impl RuntimeConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_seconds)
    }
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, alias = "test_interval", skip_serializing_if = "Option::is_none")]
    pub sample_interval_seconds: Option<i64>,

    #[serde(default, alias = "ping_target", skip_serializing_if = "Option::is_none")]
    pub diagnostic_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
}

impl ConfigUpdate {
    /// An update that sets every field of `config`
    pub fn full(config: &RuntimeConfig) -> Self {
        Self {
            sample_interval_seconds: Some(config.sample_interval_seconds as i64),
            diagnostic_target: Some(config.diagnostic_target.clone()),
            test_mode: Some(config.test_mode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_interval_seconds.is_none()
            && self.diagnostic_target.is_none()
            && self.test_mode.is_none()
    }
}

/// Outcome of [`RuntimeSettings::update`]: the resulting full config plus
/// every field that was refused.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub config: RuntimeConfig,
    pub rejected: Vec<FieldRejection>,
}

impl UpdateReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Shared handle to the runtime settings. Cloning shares the same store.
///
/// Each `get`/`update` runs under the lock, so readers never observe a
/// half-applied update.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSettings {
    inner: Arc<RwLock<RuntimeConfig>>,
}

impl RuntimeSettings {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { inner: Arc::new(RwLock::new(config)) }
    }

    /// Build settings from an initial config, validating every field with
    /// the same rules as [`update`](Self::update).
    pub async fn validated(initial: RuntimeConfig) -> Result<Self, Vec<FieldRejection>> {
        let settings = Self::default();
        let report = settings.update(ConfigUpdate::full(&initial)).await;
        if report.is_clean() { Ok(settings) } else { Err(report.rejected) }
    }

    pub async fn get(&self) -> RuntimeConfig {
        self.inner.read().await.clone()
    }

    /// Apply every valid field of `update`; invalid fields are reported and
    /// leave their current value in place.
    pub async fn update(&self, update: ConfigUpdate) -> UpdateReport {
        let mut rejected = Vec::new();
        let mut config = self.inner.write().await;

        if let Some(interval) = update.sample_interval_seconds {
            match validate_interval(interval).error {
                None => config.sample_interval_seconds = interval as u64,
                Some(reason) => rejected.push(FieldRejection::new("sample_interval_seconds", reason)),
            }
        }

        if let Some(target) = update.diagnostic_target {
            let target = target.trim();
            match validate_host(target).error {
                None => config.diagnostic_target = target.to_string(),
                Some(reason) => rejected.push(FieldRejection::new("diagnostic_target", reason)),
            }
        }

        if let Some(test_mode) = update.test_mode {
            config.test_mode = test_mode;
        }

        let config = config.clone();
        if rejected.is_empty() {
            info!(
                interval = config.sample_interval_seconds,
                target = %config.diagnostic_target,
                test_mode = config.test_mode,
                "Runtime configuration updated"
            );
        } else {
            for rejection in &rejected {
                warn!("Rejected configuration field {}", rejection);
            }
        }

        UpdateReport { config, rejected }
    }
}
