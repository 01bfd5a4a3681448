//! The Monitor: a shared, time-ordered interval log fed by samplers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use disruptwatch_types::{Condition, Interval, Intervals};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::handle::SamplingHandle;
use crate::probe::Probe;
use crate::sampler::Sampler;
use crate::state::{Clock, LogState};

/// Collects intervals from any number of samplers.
///
/// The log is append-only and ordered by start time. Appends are serialized;
/// [`Monitor::intervals`] returns a copy, so readers never block samplers for
/// longer than the copy takes. The monitor does not merge or deduplicate
/// intervals - keeping same-locator intervals disjoint is up to the samplers.
///
/// `Monitor` is cheap to clone; clones share the same log.
///
/// # Example
///
/// ```rust
/// use disruptwatch_sdk::Monitor;
/// use disruptwatch_types::Condition;
///
/// let monitor = Monitor::new();
/// monitor.record(Condition::info("e2e-test/\"upgrade\"", "upgrade started"));
///
/// let intervals = monitor.intervals(None, None);
/// assert_eq!(intervals.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Monitor {
    log: Arc<LogState>,
    samplers: Arc<Mutex<Vec<Sampler>>>,
    started_at: Arc<Mutex<Option<DateTime<Utc>>>>,
    clock: Clock,
    interval: Duration,
}

impl Monitor {
    /// Create a monitor with the default 1 second sampling interval.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    /// Create a monitor whose [`Monitor::sampler`] helper uses `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            log: Arc::new(LogState::default()),
            samplers: Arc::new(Mutex::new(Vec::new())),
            started_at: Arc::new(Mutex::new(None)),
            clock: Clock::new(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Build a sampler using this monitor's interval. It still has to be
    /// registered with [`Monitor::add_sampler`].
    pub fn sampler(&self, probe: impl Probe + 'static) -> Sampler {
        Sampler::new(self.interval, probe)
    }

    /// Register a sampler to be started by the next [`Monitor::start_sampling`].
    pub fn add_sampler(&self, sampler: Sampler) {
        self.samplers.lock().push(sampler);
    }

    /// Start every registered sampler on its own task.
    ///
    /// All samplers share one stop signal, owned by the returned handle.
    /// Dropping the handle also stops them.
    pub fn start_sampling(&self) -> SamplingHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let samplers: Vec<Sampler> = self.samplers.lock().drain(..).collect();

        self.started_at.lock().get_or_insert_with(|| self.clock.now());
        debug!(samplers = samplers.len(), "starting sampling");

        let tasks = samplers
            .into_iter()
            .map(|sampler| {
                let log = self.log.clone();
                let clock = self.clock;
                let stop_rx = stop_rx.clone();
                tokio::spawn(sampler.run(log, clock, stop_rx))
            })
            .collect();

        SamplingHandle::new(stop_tx, tasks)
    }

    /// The current time on the monitor's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// When sampling first started, if it has.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock()
    }

    /// Record a point-in-time condition at the current time.
    pub fn record(&self, condition: Condition) {
        self.log.append(Interval::instant(condition, self.clock.now()));
    }

    /// Append a fully formed interval.
    pub fn append(&self, interval: Interval) {
        self.log.append(interval);
    }

    /// Copy of the intervals starting within `[from, to)`.
    ///
    /// `None` leaves that end unbounded; `intervals(None, None)` returns the
    /// whole log.
    pub fn intervals(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Intervals {
        self.log.snapshot(from, to)
    }

    /// Number of intervals recorded so far.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a fixed sequence of up/down results, then stays up.
    struct Scripted {
        results: VecDeque<bool>,
        calls: Arc<AtomicUsize>,
        locator: &'static str,
    }

    impl Scripted {
        fn new(locator: &'static str, results: &[bool]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    results: results.iter().copied().collect(),
                    calls: calls.clone(),
                    locator,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Probe for Scripted {
        async fn probe(&mut self, previous_up: bool) -> (Option<Condition>, bool) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_up = self.results.pop_front().unwrap_or(true);
            let condition = match (previous_up, now_up) {
                (true, false) => Some(Condition::error(self.locator, "began")),
                (false, true) => Some(Condition::info(self.locator, "ended")),
                _ => None,
            };
            (condition, now_up)
        }
    }

    /// Sleeps longer than the sampling interval before reporting down.
    struct Slow;

    #[async_trait]
    impl Probe for Slow {
        async fn probe(&mut self, _previous_up: bool) -> (Option<Condition>, bool) {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (Some(Condition::error("disruption/slow", "began")), false)
        }
    }

    #[test]
    fn default_interval_is_one_second() {
        let monitor = Monitor::default();
        assert_eq!(monitor.interval(), Duration::from_secs(1));
        assert!(monitor.is_empty());
        assert!(monitor.started_at().is_none());
    }

    #[test]
    fn clones_share_the_log() {
        let monitor = Monitor::new();
        let clone = monitor.clone();
        clone.record(Condition::info("node/a", "rebooted"));
        assert_eq!(monitor.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn samplers_record_transitions_and_outages() {
        let monitor = Monitor::with_interval(Duration::from_secs(1));
        let (probe, _) = Scripted::new("disruption/a", &[true, false, false, false, true]);
        monitor.add_sampler(
            monitor
                .sampler(probe)
                .when_failing(Condition::error("disruption/a", "still failing")),
        );

        let sampling = monitor.start_sampling();
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        sampling.stop().await;

        let intervals = monitor.intervals(None, None);
        let messages: Vec<_> = intervals.iter().map(|i| i.message()).collect();
        assert_eq!(messages, vec!["began", "still failing", "ended"]);

        let outage = &intervals.as_slice()[1];
        assert_eq!(outage.duration(), Duration::from_secs(3));
        assert_eq!(intervals.duration(Duration::from_secs(1)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_segments_count_as_one_outage() {
        let monitor = Monitor::with_interval(Duration::from_millis(200));
        let mut script = vec![true];
        script.extend(std::iter::repeat(false).take(25));
        let (probe, _) = Scripted::new("disruption/a", &script);
        monitor.add_sampler(
            monitor
                .sampler(probe)
                .when_failing(Condition::error("disruption/a", "still failing"))
                .continuing_period(Duration::from_millis(500)),
        );

        let sampling = monitor.start_sampling();
        tokio::time::sleep(Duration::from_millis(6_100)).await;
        sampling.stop().await;

        let intervals = monitor.intervals(None, None);
        let segments = intervals
            .iter()
            .filter(|i| i.message() == "still failing")
            .count();
        assert!(segments > 1);
        assert_eq!(intervals.duration(Duration::from_secs(1)), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn samplers_run_independently() {
        let monitor = Monitor::new();
        let (fast, fast_calls) = Scripted::new("disruption/fast", &[]);
        monitor.add_sampler(monitor.sampler(fast));
        monitor.add_sampler(monitor.sampler(Slow));

        let sampling = monitor.start_sampling();
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        sampling.stop().await;

        // the slow probe must not hold back the fast one
        assert!(fast_calls.load(Ordering::SeqCst) >= 9);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_appends() {
        let monitor = Monitor::new();
        let pattern: Vec<bool> = (0..100).map(|i| i % 2 == 0).collect();
        let (probe, calls) = Scripted::new("disruption/flappy", &pattern);
        monitor.add_sampler(monitor.sampler(probe));

        let sampling = monitor.start_sampling();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        sampling.cancel();
        let recorded = monitor.len();
        let polled = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(monitor.len(), recorded);
        assert_eq!(calls.load(Ordering::SeqCst), polled);
        sampling.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_is_discarded_after_cancel() {
        let monitor = Monitor::new();
        monitor.add_sampler(monitor.sampler(Slow));

        let sampling = monitor.start_sampling();
        // first probe starts at t=0 and finishes at t=5
        tokio::time::sleep(Duration::from_secs(2)).await;
        sampling.stop().await;

        assert!(monitor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_sampling() {
        let monitor = Monitor::new();
        let (probe, calls) = Scripted::new("disruption/a", &[]);
        monitor.add_sampler(monitor.sampler(probe));

        let sampling = monitor.start_sampling();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        drop(sampling);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let polled = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn start_sampling_records_start_time_once() {
        let monitor = Monitor::new();
        let first = monitor.start_sampling();
        let started = monitor.started_at();
        assert!(started.is_some());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let second = monitor.start_sampling();
        assert_eq!(monitor.started_at(), started);

        first.stop().await;
        second.stop().await;
    }
}
