/// Monitoring engine module
///
/// This module is responsible for:
/// - Measuring the link through a probe
/// - Scheduling samples and recovery retries
/// - Turning probe outcomes into outage intervals
/// - Holding the runtime settings shared with request handlers
pub mod probe;
pub mod runtime;
pub mod scheduler;
pub mod tracker;
pub mod types;

pub use probe::{HttpSpeedProbe, ModeProbe, Probe, SimulatedProbe};
pub use runtime::{ConfigUpdate, RuntimeConfig, RuntimeSettings, UpdateReport};
pub use scheduler::Scheduler;
pub use tracker::{OutageTracker, Transition};
pub use types::{AttemptOutcome, LinkStatus, OutageInterval, ProbeReading, Sample};
