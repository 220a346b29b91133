//! linkwatch: continuous link-quality monitoring with outage tracking.
//!
//! The crate is organised around one long-running [`Scheduler`] task that
//! samples the link through a [`Probe`], feeds each outcome to the
//! [`OutageTracker`] and records samples and outage intervals in an
//! [`EventStore`]. Everything else (diagnostics, retention, the log journal)
//! hangs off the [`Orchestrator`].

pub mod clock;
pub mod config;
pub mod database;
pub mod diagnostics;
pub mod error;
pub mod journal;
pub mod monitoring;
pub mod orchestrator;
pub mod pool;
pub mod retention;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::{EventStore, EventStoreImpl};
pub use monitoring::{OutageTracker, Probe, RuntimeSettings, Scheduler};
pub use orchestrator::{MonitorHandle, Orchestrator};
