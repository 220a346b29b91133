use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe::Probe;
use super::runtime::RuntimeSettings;
use super::tracker::{OutageTracker, Transition};
use super::types::{AttemptOutcome, LinkStatus, OutageInterval, Sample};
use crate::clock::Clock;
use crate::database::EventStore;

/// Wait between probe retries while an outage is open
pub const DEFAULT_RECOVERY_BACKOFF: Duration = Duration::from_secs(60);

/// Drives the sampling cadence and feeds every outcome to the outage tracker.
///
/// Scheduled and manual attempts take turns on `attempts`, so reports reach
/// the tracker one at a time in completion order. The tracker itself is only
/// locked around a report or a status read, never across a probe.
pub struct Scheduler {
    probe: Arc<dyn Probe>,
    store: Arc<dyn EventStore>,
    settings: RuntimeSettings,
    clock: Arc<dyn Clock>,
    attempts: Mutex<()>,
    tracker: Mutex<OutageTracker>,
    recovery_backoff: Duration,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(
        probe: Arc<dyn Probe>,
        store: Arc<dyn EventStore>,
        settings: RuntimeSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            probe,
            store,
            settings,
            clock,
            attempts: Mutex::new(()),
            tracker: Mutex::new(OutageTracker::new()),
            recovery_backoff: DEFAULT_RECOVERY_BACKOFF,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_recovery_backoff(mut self, backoff: Duration) -> Self {
        self.recovery_backoff = backoff;
        self
    }

    /// Run the sampling loop on its own task until `cancel` fires
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    }

    /// The sampling loop. Each cycle makes one attempt; a failure switches to
    /// the recovery loop until the link is back. The steady-state interval is
    /// read fresh before every sleep and applies after a recovery as well.
    ///
    /// Cancellation is observed at the two sleep points only.
    pub async fn run(&self, cancel: CancellationToken) {
        self.running.store(true, Ordering::SeqCst);
        info!(backoff_secs = self.recovery_backoff.as_secs(), "Scheduler started");

        while !cancel.is_cancelled() {
            if !self.attempt().await.is_success() && !self.recover(&cancel).await {
                break;
            }

            let interval = self.settings.get().await.sample_interval();
            debug!(interval_secs = interval.as_secs(), "Sleeping until next sample");
            if !self.pause(interval, &cancel).await {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Scheduler stopped");
    }

    /// One attempt outside the schedule. Recorded and reported exactly like a
    /// scheduled attempt; the schedule's own timers are left alone.
    pub async fn trigger_once(&self) -> AttemptOutcome {
        info!("Manual test triggered");
        self.attempt().await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn link_status(&self) -> LinkStatus {
        self.tracker.lock().await.status()
    }

    pub async fn open_outage(&self) -> Option<OutageInterval> {
        self.tracker.lock().await.open_outage()
    }

    /// Retry every backoff period until the link is up again. Returns false
    /// when cancelled first.
    async fn recover(&self, cancel: &CancellationToken) -> bool {
        loop {
            if !self.pause(self.recovery_backoff, cancel).await {
                return false;
            }

            if !self.tracker.lock().await.is_down() {
                debug!("Outage already closed by a manual test");
                return true;
            }

            if self.attempt().await.is_success() {
                return true;
            }
        }
    }

    /// Sleep on the clock; false if cancelled before or during the sleep
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.clock.sleep(duration) => true,
        }
    }

    async fn attempt(&self) -> AttemptOutcome {
        let _turn = self.attempts.lock().await;
        let result = self.probe.measure().await;
        let at = self.clock.now();

        match result {
            Ok(reading) => {
                let sample = Sample::from_reading(at, reading);
                info!(
                    "Speed test completed: Download: {:.2} Mbps, Upload: {:.2} Mbps, Latency: {:.2} ms",
                    sample.download, sample.upload, sample.latency
                );
                if let Err(e) = self.store.save_sample(&sample).await {
                    error!("Failed to record sample taken at {}: {}", at, e);
                }

                let transition = self.tracker.lock().await.report(LinkStatus::Up, at);
                if let Transition::Closed(outage) = transition {
                    info!(duration_secs = outage.duration_secs(), "Outage ended at {}", at);
                    if let Err(e) = self.store.save_outage(&outage).await {
                        error!("Failed to record outage starting at {}: {}", outage.start_time, e);
                    }
                }

                AttemptOutcome::Success(sample)
            }
            Err(e) => {
                error!("Speed test failed: {}", e);
                let transition = self.tracker.lock().await.report(LinkStatus::Down, at);
                if let Transition::Opened { start_time } = transition {
                    warn!("Outage detected at {}", start_time);
                }

                AttemptOutcome::Failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::monitoring::runtime::RuntimeConfig;
    use crate::error::ProbeError;
    use crate::monitoring::types::ProbeReading;
    use crate::testing::{MemoryStore, READING, ScriptedProbe};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Probe that parks inside `measure` until released, then fails
    #[derive(Default)]
    struct GatedProbe {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Probe for GatedProbe {
        async fn measure(&self) -> Result<ProbeReading, ProbeError> {
            self.entered.notify_one();
            self.release.notified().await;
            Err(ProbeError::Unavailable("released".to_string()))
        }
    }

    /// Clock whose sleeps block until the test wakes them, recording each
    /// requested duration
    #[derive(Default)]
    struct SteppedClock {
        time: ManualClock,
        sleeps: std::sync::Mutex<Vec<Duration>>,
        sleeping: Notify,
        wake: Notify,
    }

    impl SteppedClock {
        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for SteppedClock {
        fn now(&self) -> i64 {
            self.time.now()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            self.sleeping.notify_one();
            self.wake.notified().await;
            self.time.advance(duration);
        }
    }

    fn settings(interval: u64) -> RuntimeSettings {
        RuntimeSettings::new(RuntimeConfig { sample_interval_seconds: interval, ..Default::default() })
    }

    fn scheduler(
        probe: ScriptedProbe,
        store: Arc<MemoryStore>,
        interval: u64,
        start: i64,
    ) -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let scheduler = Scheduler::new(Arc::new(probe), store, settings(interval), clock.clone());
        (scheduler, clock)
    }

    #[tokio::test]
    async fn test_outage_recovery_scenario() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let probe = ScriptedProbe::new([false, false, false, true], true).cancel_when_exhausted(cancel.clone());
        let (scheduler, clock) = scheduler(probe, store.clone(), 3600, 0);

        scheduler.run(cancel).await;

        assert_eq!(store.outages(), vec![OutageInterval { start_time: 0, end_time: Some(180) }]);
        assert_eq!(store.samples(), vec![Sample::from_reading(180, READING)]);
        assert_eq!(scheduler.link_status().await, LinkStatus::Up);
        assert_eq!(clock.now(), 180);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_steady_state_samples_every_interval() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let probe = ScriptedProbe::new([true; 4], true).cancel_when_exhausted(cancel.clone());
        let (scheduler, _clock) = scheduler(probe, store.clone(), 600, 1_000);

        scheduler.run(cancel).await;

        assert!(store.outages().is_empty());
        let timestamps: Vec<_> = store.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1_000, 1_600, 2_200, 2_800]);
    }

    #[tokio::test]
    async fn test_full_interval_applies_after_recovery() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let probe = ScriptedProbe::new([false, true, true], true).cancel_when_exhausted(cancel.clone());
        let (scheduler, _clock) = scheduler(probe, store.clone(), 600, 0);

        scheduler.run(cancel).await;

        let timestamps: Vec<_> = store.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![60, 660]);
        assert_eq!(store.outages(), vec![OutageInterval { start_time: 0, end_time: Some(60) }]);
    }

    #[tokio::test]
    async fn test_custom_recovery_backoff() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let probe = ScriptedProbe::new([false, false, true], true).cancel_when_exhausted(cancel.clone());
        let (scheduler, _clock) = scheduler(probe, store.clone(), 600, 0);
        let scheduler = scheduler.with_recovery_backoff(Duration::from_secs(15));

        scheduler.run(cancel).await;

        assert_eq!(store.outages(), vec![OutageInterval { start_time: 0, end_time: Some(30) }]);
    }

    #[tokio::test]
    async fn test_store_failures_do_not_stop_the_loop() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::failing());
        let probe = Arc::new(ScriptedProbe::new([true, false, true, true], true).cancel_when_exhausted(cancel.clone()));
        let clock = Arc::new(ManualClock::new(0));
        let scheduler = Scheduler::new(probe.clone(), store.clone(), settings(60), clock);

        scheduler.run(cancel).await;

        assert_eq!(probe.calls(), 4);
        assert!(store.samples().is_empty());
        assert_eq!(scheduler.link_status().await, LinkStatus::Up);
    }

    #[tokio::test]
    async fn test_trigger_once_closes_open_outage() {
        let store = Arc::new(MemoryStore::new());
        let probe = ScriptedProbe::new([false, false, true], true);
        let (scheduler, clock) = scheduler(probe, store.clone(), 3600, 500);

        assert!(!scheduler.trigger_once().await.is_success());
        assert_eq!(scheduler.open_outage().await, Some(OutageInterval::open(500)));

        clock.advance(Duration::from_secs(20));
        let outcome = scheduler.trigger_once().await;
        assert_eq!(outcome.status(), LinkStatus::Down);
        assert_eq!(scheduler.open_outage().await, Some(OutageInterval::open(500)));

        clock.advance(Duration::from_secs(20));
        assert!(scheduler.trigger_once().await.is_success());
        assert_eq!(scheduler.link_status().await, LinkStatus::Up);
        assert_eq!(store.outages(), vec![OutageInterval { start_time: 500, end_time: Some(540) }]);
        assert_eq!(store.samples(), vec![Sample::from_reading(540, READING)]);
    }

    #[tokio::test]
    async fn test_status_readable_while_probe_runs() {
        let probe = Arc::new(GatedProbe::default());
        let scheduler = Arc::new(Scheduler::new(
            probe.clone(),
            Arc::new(MemoryStore::new()),
            settings(60),
            Arc::new(ManualClock::new(0)),
        ));

        let attempt = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.trigger_once().await.is_success() }
        });
        probe.entered.notified().await;

        let status = tokio::time::timeout(Duration::from_secs(1), scheduler.link_status())
            .await
            .expect("status blocked by a running attempt");
        assert_eq!(status, LinkStatus::Up);
        let outage = tokio::time::timeout(Duration::from_secs(1), scheduler.open_outage())
            .await
            .expect("outage blocked by a running attempt");
        assert_eq!(outage, None);

        probe.release.notify_one();
        assert!(!attempt.await.unwrap());
        assert_eq!(scheduler.open_outage().await, Some(OutageInterval::open(0)));
    }

    #[tokio::test]
    async fn test_manual_close_during_backoff_ends_recovery() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let probe = Arc::new(ScriptedProbe::new([false, true], true));
        let clock = Arc::new(SteppedClock::default());
        let scheduler = Arc::new(Scheduler::new(probe.clone(), store.clone(), settings(3600), clock.clone()));

        let handle = scheduler.spawn(cancel.clone());

        // parked in the recovery backoff after the failed scheduled attempt
        clock.sleeping.notified().await;
        assert_eq!(scheduler.open_outage().await, Some(OutageInterval::open(0)));

        clock.time.advance(Duration::from_secs(30));
        assert!(scheduler.trigger_once().await.is_success());
        assert_eq!(scheduler.link_status().await, LinkStatus::Up);

        clock.wake.notify_one();
        clock.sleeping.notified().await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(probe.calls(), 2);
        assert_eq!(store.outages(), vec![OutageInterval { start_time: 0, end_time: Some(30) }]);
        assert_eq!(store.samples(), vec![Sample::from_reading(30, READING)]);
        assert_eq!(clock.sleeps(), vec![DEFAULT_RECOVERY_BACKOFF, Duration::from_secs(3600)]);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_cancel_during_recovery_leaves_outage_open() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let probe = Arc::new(ScriptedProbe::new([false], false).cancel_when_exhausted(cancel.clone()));
        let scheduler = Scheduler::new(probe.clone(), store.clone(), settings(3600), Arc::new(ManualClock::new(0)));

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(cancel))
            .await
            .expect("run returns once cancelled in the backoff");

        assert_eq!(probe.calls(), 1);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.open_outage().await, Some(OutageInterval::open(0)));
        assert!(store.outages().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let store = Arc::new(MemoryStore::new());
        let probe = Arc::new(ScriptedProbe::always_succeeding());
        let scheduler = Scheduler::new(probe.clone(), store, settings(60), Arc::new(ManualClock::new(0)));

        scheduler.run(cancel).await;

        assert_eq!(probe.calls(), 0);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_spawned_loop_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(ScriptedProbe::always_succeeding()),
            store.clone(),
            settings(3600),
            Arc::new(crate::clock::SystemClock),
        ));

        let handle = scheduler.spawn(cancel.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.samples().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first sample recorded");
        assert!(scheduler.is_running());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler stopped")
            .expect("scheduler task panicked");
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_sample_round_trip_through_libsql() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let pool = crate::pool::open_pool(&temp_dir.path().join("rt.db").to_string_lossy(), 2).await?;
        crate::database::initialize_database(&*pool.get().await?).await?;
        let store = Arc::new(crate::database::EventStoreImpl::new_from_pool(pool));

        let scheduler = Scheduler::new(
            Arc::new(ScriptedProbe::always_succeeding()),
            store.clone(),
            settings(3600),
            Arc::new(ManualClock::new(1_700_000_000)),
        );
        store.save_sample(&Sample::from_reading(1_700_000_000, READING)).await?;

        let AttemptOutcome::Success(sample) = scheduler.trigger_once().await else {
            panic!("scripted probe always succeeds");
        };

        let latest = store.recent_samples(100).await?;
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0], sample);
        Ok(())
    }
}
