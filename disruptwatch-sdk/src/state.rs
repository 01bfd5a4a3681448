//! Internal state shared between a monitor and its samplers.

use chrono::{DateTime, TimeDelta, Utc};
use disruptwatch_types::{Interval, Intervals};
use parking_lot::RwLock;
use tokio::time::Instant;

/// Wall-clock time derived from the runtime's monotonic clock.
///
/// Anchoring to `tokio::time::Instant` keeps interval lengths monotonic and
/// lets paused-time tests advance the clock deterministically.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock {
    wall: DateTime<Utc>,
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::zero());
        self.wall + elapsed
    }
}

/// Append-only interval log, kept sorted by start time.
#[derive(Debug, Default)]
pub(crate) struct LogState {
    intervals: RwLock<Vec<Interval>>,
}

impl LogState {
    /// Insert after any interval with the same or an earlier start.
    pub fn append(&self, interval: Interval) {
        let mut intervals = self.intervals.write();
        let at = intervals.partition_point(|i| i.from <= interval.from);
        intervals.insert(at, interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.read().len()
    }

    /// Point-in-time copy of intervals starting within `[from, to)`.
    pub fn snapshot(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Intervals {
        let intervals = self.intervals.read();
        intervals
            .iter()
            .filter(|i| from.map_or(true, |f| i.from >= f) && to.map_or(true, |t| i.from < t))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use disruptwatch_types::Condition;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn event(secs: i64, message: &str) -> Interval {
        Interval::instant(Condition::info("disruption/svc", message), at(secs))
    }

    #[test]
    fn append_keeps_start_order() {
        let log = LogState::default();
        log.append(event(5, "b"));
        log.append(event(1, "a"));
        log.append(event(9, "c"));

        let messages: Vec<_> = log
            .snapshot(None, None)
            .iter()
            .map(|i| i.message().to_string())
            .collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_starts_keep_append_order() {
        let log = LogState::default();
        log.append(event(1, "first"));
        log.append(event(1, "second"));

        let snapshot = log.snapshot(None, None);
        assert_eq!(snapshot.as_slice()[0].message(), "first");
        assert_eq!(snapshot.as_slice()[1].message(), "second");
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let log = LogState::default();
        log.append(event(1, "a"));
        let snapshot = log.snapshot(None, None);
        log.append(event(2, "b"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn snapshot_filters_half_open_range() {
        let log = LogState::default();
        for secs in [0, 5, 10] {
            log.append(event(secs, "x"));
        }
        assert_eq!(log.snapshot(Some(at(5)), Some(at(10))).len(), 1);
        assert_eq!(log.snapshot(Some(at(5)), None).len(), 2);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        use std::thread;

        let log = Arc::new(LogState::default());
        let mut handles = vec![];
        for t in 0..8 {
            let log = log.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    log.append(event(t * 100 + i, "x"));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = log.snapshot(None, None);
        assert_eq!(snapshot.len(), 800);
        assert!(snapshot
            .as_slice()
            .windows(2)
            .all(|w| w[0].from <= w[1].from));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_runtime_time() {
        let clock = Clock::new();
        let start = clock.now();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!((clock.now() - start).num_seconds(), 30);
    }
}
