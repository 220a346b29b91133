//! In-process fakes for exercising the monitor without network or disk.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::database::{EventStore, LogEntry};
use crate::error::{ProbeError, StoreError};
use crate::monitoring::probe::Probe;
use crate::monitoring::types::{OutageInterval, ProbeReading, Sample};

pub const READING: ProbeReading = ProbeReading { download_mbps: 94.2, upload_mbps: 18.7, latency_ms: 11.3 };

/// Probe that replays a fixed list of outcomes (`true` = success), then
/// keeps returning `fallback`.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicUsize,
    exhausted: Option<CancellationToken>,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            exhausted: None,
        }
    }

    pub fn always_succeeding() -> Self {
        Self::new(Vec::new(), true)
    }

    pub fn always_failing() -> Self {
        Self::new(Vec::new(), false)
    }

    /// Cancel `token` once the last scripted outcome has been handed out
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.exhausted = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn measure(&self) -> Result<ProbeReading, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let succeeded = {
            let mut script = self.script.lock().expect("script lock poisoned");
            let next = script.pop_front().unwrap_or(self.fallback);
            if script.is_empty() {
                if let Some(token) = &self.exhausted {
                    token.cancel();
                }
            }
            next
        };

        if succeeded {
            Ok(READING)
        } else {
            Err(ProbeError::Unavailable("scripted failure".to_string()))
        }
    }
}

/// Event store kept in memory. Every operation can be made to fail on demand.
#[derive(Default)]
pub struct MemoryStore {
    samples: Mutex<Vec<Sample>>,
    outages: Mutex<Vec<OutageInterval>>,
    logs: Mutex<Vec<LogEntry>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().expect("samples lock poisoned").clone()
    }

    pub fn outages(&self) -> Vec<OutageInterval> {
        self.outages.lock().expect("outages lock poisoned").clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().expect("logs lock poisoned").clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Corrupt("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Newest first by `key`, ties in reverse insertion order
fn newest_first<T: Clone>(rows: &[T], limit: usize, key: impl Fn(&T) -> i64) -> Vec<T> {
    let mut rows: Vec<T> = rows.iter().rev().cloned().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
    rows.truncate(limit);
    rows
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn save_sample(&self, sample: &Sample) -> Result<i64, StoreError> {
        self.check_available()?;
        let mut samples = self.samples.lock().expect("samples lock poisoned");
        samples.push(sample.clone());
        Ok(samples.len() as i64)
    }

    async fn save_outage(&self, outage: &OutageInterval) -> Result<i64, StoreError> {
        self.check_available()?;
        if outage.is_open() {
            return Err(StoreError::InvalidRecord("outage is still open".to_string()));
        }
        let mut outages = self.outages.lock().expect("outages lock poisoned");
        outages.push(*outage);
        Ok(outages.len() as i64)
    }

    async fn save_log(&self, entry: &LogEntry) -> Result<i64, StoreError> {
        self.check_available()?;
        let mut logs = self.logs.lock().expect("logs lock poisoned");
        logs.push(entry.clone());
        Ok(logs.len() as i64)
    }

    async fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>, StoreError> {
        self.check_available()?;
        Ok(newest_first(&self.samples(), limit, |s| s.timestamp))
    }

    async fn recent_outages(&self, limit: usize) -> Result<Vec<OutageInterval>, StoreError> {
        self.check_available()?;
        Ok(newest_first(&self.outages(), limit, |o| o.start_time))
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        self.check_available()?;
        Ok(newest_first(&self.logs(), limit, |l| l.timestamp))
    }

    async fn prune_logs(&self, before: i64) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut logs = self.logs.lock().expect("logs lock poisoned");
        let len = logs.len();
        logs.retain(|entry| entry.timestamp >= before);
        Ok((len - logs.len()) as u64)
    }

    async fn status(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
