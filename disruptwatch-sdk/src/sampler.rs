//! Samplers - independent polling loops feeding a monitor's log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use disruptwatch_types::{Condition, Interval};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::probe::Probe;
use crate::state::{Clock, LogState};

/// Default minimum spacing between "still failing" intervals.
pub const DEFAULT_CONTINUING_PERIOD: Duration = Duration::from_secs(10);

/// A repeating probe with up/down state.
///
/// Every `interval` the sampler calls its [`Probe`] with the previous state.
/// Conditions returned by the probe are recorded as point-in-time intervals.
/// If a "still failing" condition was configured with [`Sampler::when_failing`],
/// the sampler also records how long the target stayed down: while down it
/// commits one interval per `continuing_period`, and it closes the outage when
/// the target comes back or sampling stops.
///
/// # Example
///
/// ```rust,no_run
/// # use async_trait::async_trait;
/// # use disruptwatch_sdk::{Monitor, Probe, Sampler};
/// # use disruptwatch_types::Condition;
/// # use std::time::Duration;
/// # struct Check;
/// # #[async_trait]
/// # impl Probe for Check {
/// #     async fn probe(&mut self, _: bool) -> (Option<Condition>, bool) { (None, true) }
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let monitor = Monitor::with_interval(Duration::from_secs(1));
/// monitor.add_sampler(
///     Sampler::new(Duration::from_secs(1), Check)
///         .when_failing(Condition::error("disruption/svc", "svc is not responding")),
/// );
/// let sampling = monitor.start_sampling();
/// // ... disruptive operation ...
/// sampling.stop().await;
/// # }
/// ```
pub struct Sampler {
    interval: Duration,
    probe: Box<dyn Probe>,
    continuing: Option<Condition>,
    continuing_period: Duration,
    state: SamplerState,
}

impl Sampler {
    /// Create a sampler. The target is assumed up until the first probe says otherwise.
    pub fn new(interval: Duration, probe: impl Probe + 'static) -> Self {
        Self {
            interval,
            probe: Box::new(probe),
            continuing: None,
            continuing_period: DEFAULT_CONTINUING_PERIOD,
            state: SamplerState::default(),
        }
    }

    /// Record the outage duration under `condition` while the target is down.
    pub fn when_failing(mut self, condition: Condition) -> Self {
        self.continuing = Some(condition);
        self
    }

    /// Minimum spacing between committed "still failing" intervals.
    ///
    /// Defaults to 10 seconds. Values below the sampling interval behave as
    /// one interval per sample.
    pub fn continuing_period(mut self, period: Duration) -> Self {
        self.continuing_period = period;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) async fn run(
        mut self,
        log: Arc<LogState>,
        clock: Clock,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let previous = self.state.up;
                    let (condition, now_up) = self.probe.probe(previous).await;

                    // Sampling may have been stopped while the probe was in flight.
                    if is_stopped(&stop_rx) {
                        debug!("discarding sample taken across cancellation");
                        break;
                    }

                    let now = clock.now();
                    for interval in self.state.observe(
                        now,
                        condition,
                        now_up,
                        self.continuing.as_ref(),
                        self.continuing_period,
                    ) {
                        log.append(interval);
                    }
                }
            }
        }

        if let Some(interval) = self.state.close(self.continuing.as_ref()) {
            log.append(interval);
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("interval", &self.interval)
            .field("continuing", &self.continuing)
            .field("continuing_period", &self.continuing_period)
            .finish()
    }
}

fn is_stopped(stop_rx: &watch::Receiver<bool>) -> bool {
    *stop_rx.borrow() || stop_rx.has_changed().is_err()
}

/// An outage in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Outage {
    /// Start of the not-yet-committed part of the outage.
    segment_start: DateTime<Utc>,
    /// Time of the most recent sample that saw the target down.
    last_down: DateTime<Utc>,
}

/// The up/down state machine, owned by a single sampler.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SamplerState {
    up: bool,
    outage: Option<Outage>,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            up: true,
            outage: None,
        }
    }
}

impl SamplerState {
    /// Apply one sample and return the intervals to commit.
    pub fn observe(
        &mut self,
        now: DateTime<Utc>,
        condition: Option<Condition>,
        now_up: bool,
        continuing: Option<&Condition>,
        period: Duration,
    ) -> Vec<Interval> {
        let mut committed = Vec::new();
        if let Some(condition) = condition {
            committed.push(Interval::instant(condition, now));
        }

        let period = TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX);
        if now_up {
            if let (Some(outage), Some(continuing)) = (self.outage.take(), continuing) {
                if now > outage.segment_start {
                    committed.push(Interval::new(continuing.clone(), outage.segment_start, now));
                }
            }
        } else if let Some(outage) = self.outage.as_mut() {
            outage.last_down = now;
            if now - outage.segment_start >= period {
                if let Some(continuing) = continuing {
                    committed.push(Interval::new(continuing.clone(), outage.segment_start, now));
                }
                outage.segment_start = now;
            }
        } else {
            self.outage = Some(Outage {
                segment_start: now,
                last_down: now,
            });
        }

        self.up = now_up;
        committed
    }

    /// Commit the observed part of an outage still in progress.
    pub fn close(&mut self, continuing: Option<&Condition>) -> Option<Interval> {
        let outage = self.outage.take()?;
        let continuing = continuing?;
        (outage.last_down > outage.segment_start)
            .then(|| Interval::new(continuing.clone(), outage.segment_start, outage.last_down))
    }

    #[cfg(test)]
    pub fn is_up(&self) -> bool {
        self.up
    }
}
