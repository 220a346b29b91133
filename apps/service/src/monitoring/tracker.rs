//! Outage state machine.
//!
//! The tracker only sees binary outcomes. Timeouts, partial measurements and
//! the like are collapsed to a failure before they get here.

use super::types::{LinkStatus, OutageInterval};

/// What a single report did to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No state change
    Unchanged,
    /// UP -> DOWN: a new interval was opened at `start_time`
    Opened { start_time: i64 },
    /// DOWN -> UP: the open interval was closed and is ready to persist
    Closed(OutageInterval),
}

/// Converts a stream of up/down reports into outage intervals.
///
/// Starts UP. At most one interval is open at any time; a closed interval is
/// handed back to the caller and never touched again.
#[derive(Debug, Default)]
pub struct OutageTracker {
    open: Option<OutageInterval>,
}

impl OutageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> LinkStatus {
        if self.open.is_some() { LinkStatus::Down } else { LinkStatus::Up }
    }

    pub fn is_down(&self) -> bool {
        self.open.is_some()
    }

    /// The currently open interval, if any
    pub fn open_outage(&self) -> Option<OutageInterval> {
        self.open
    }

    /// Feed one outcome observed at `at` (epoch seconds).
    pub fn report(&mut self, status: LinkStatus, at: i64) -> Transition {
        match (self.open.take(), status) {
            (None, LinkStatus::Down) => {
                self.open = Some(OutageInterval::open(at));
                Transition::Opened { start_time: at }
            }
            (Some(open), LinkStatus::Down) => {
                self.open = Some(open);
                Transition::Unchanged
            }
            (Some(open), LinkStatus::Up) => {
                // a report can't predate the failure that opened the interval
                let end_time = at.max(open.start_time);
                Transition::Closed(OutageInterval { start_time: open.start_time, end_time: Some(end_time) })
            }
            (None, LinkStatus::Up) => Transition::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays `(status, at)` pairs and collects every closed interval.
    fn replay(reports: &[(LinkStatus, i64)]) -> (OutageTracker, Vec<OutageInterval>) {
        let mut tracker = OutageTracker::new();
        let mut closed = Vec::new();
        for &(status, at) in reports {
            if let Transition::Closed(interval) = tracker.report(status, at) {
                closed.push(interval);
            }
        }
        (tracker, closed)
    }

    #[test]
    fn test_starts_up() {
        let tracker = OutageTracker::new();
        assert_eq!(tracker.status(), LinkStatus::Up);
        assert!(tracker.open_outage().is_none());
    }

    #[test]
    fn test_transitions() {
        let mut tracker = OutageTracker::new();

        assert_eq!(tracker.report(LinkStatus::Up, 0), Transition::Unchanged);
        assert_eq!(tracker.report(LinkStatus::Down, 10), Transition::Opened { start_time: 10 });
        assert_eq!(tracker.report(LinkStatus::Down, 20), Transition::Unchanged);
        assert_eq!(tracker.open_outage(), Some(OutageInterval::open(10)));

        assert_eq!(
            tracker.report(LinkStatus::Up, 30),
            Transition::Closed(OutageInterval { start_time: 10, end_time: Some(30) })
        );
        assert_eq!(tracker.status(), LinkStatus::Up);
        assert_eq!(tracker.report(LinkStatus::Up, 40), Transition::Unchanged);
    }

    #[test]
    fn test_intervals_cover_maximal_failure_runs() {
        use LinkStatus::{Down, Up};

        let (tracker, closed) = replay(&[
            (Up, 0),
            (Down, 60),
            (Down, 120),
            (Up, 180),
            (Up, 240),
            (Down, 300),
            (Up, 360),
            (Down, 420),
            (Down, 480),
        ]);

        assert_eq!(
            closed,
            vec![
                OutageInterval { start_time: 60, end_time: Some(180) },
                OutageInterval { start_time: 300, end_time: Some(360) },
            ]
        );
        // trailing failures leave exactly one interval open
        assert_eq!(tracker.open_outage(), Some(OutageInterval::open(420)));
    }

    #[test]
    fn test_all_successes_produce_nothing() {
        let reports: Vec<_> = (0..10).map(|i| (LinkStatus::Up, i * 3600)).collect();
        let (tracker, closed) = replay(&reports);
        assert!(closed.is_empty());
        assert!(!tracker.is_down());
    }

    #[test]
    fn test_closed_interval_never_ends_before_it_starts() {
        let mut tracker = OutageTracker::new();
        tracker.report(LinkStatus::Down, 100);
        let Transition::Closed(interval) = tracker.report(LinkStatus::Up, 90) else {
            panic!("expected the outage to close");
        };
        assert_eq!(interval.duration_secs(), Some(0));
    }
}
