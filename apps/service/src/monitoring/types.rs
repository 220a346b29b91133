use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Binary state of the monitored link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Up => write!(f, "up"),
            LinkStatus::Down => write!(f, "down"),
        }
    }
}

/// Raw numbers returned by one successful probe attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeReading {
    /// Download throughput in Mbps
    pub download_mbps: f64,

    /// Upload throughput in Mbps
    pub upload_mbps: f64,

    /// Round-trip latency in milliseconds
    pub latency_ms: f64,
}

/// One successful measurement, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Attempt completion time, seconds since the Unix epoch
    pub timestamp: i64,

    /// Download throughput in Mbps
    pub download: f64,

    /// Upload throughput in Mbps
    pub upload: f64,

    /// Latency in milliseconds
    pub latency: f64,
}

impl Sample {
    pub fn from_reading(timestamp: i64, reading: ProbeReading) -> Self {
        Self {
            timestamp,
            download: reading.download_mbps,
            upload: reading.upload_mbps,
            latency: reading.latency_ms,
        }
    }
}

/// A run of consecutive failed attempts. `end_time` stays `None` while the
/// outage is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageInterval {
    pub start_time: i64,
    pub end_time: Option<i64>,
}

impl OutageInterval {
    pub fn open(start_time: i64) -> Self {
        Self { start_time, end_time: None }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Length of a closed interval in seconds
    pub fn duration_secs(&self) -> Option<i64> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// Result of a single probe attempt after it has been recorded
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Sample),
    Failure(ProbeError),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }

    pub fn status(&self) -> LinkStatus {
        match self {
            AttemptOutcome::Success(_) => LinkStatus::Up,
            AttemptOutcome::Failure(_) => LinkStatus::Down,
        }
    }
}
