//! Intervals - conditions stamped with the time range during which they held.

use core::fmt;
use core::time::Duration;

use chrono::{DateTime, Utc};

use crate::{Condition, SchemaVersion};

/// A condition that held from `from` until `to`.
///
/// Transition events are recorded as zero-length intervals (`from == to`);
/// outages are recorded with the range they were observed over.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub condition: Condition,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Interval {
    /// Create an interval. A `to` earlier than `from` is clamped to `from`.
    pub fn new(condition: Condition, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            condition,
            from,
            to: to.max(from),
        }
    }

    /// A zero-length interval marking a point-in-time event.
    pub fn instant(condition: Condition, at: DateTime<Utc>) -> Self {
        Self::new(condition, at, at)
    }

    pub fn locator(&self) -> &str {
        &self.condition.locator
    }

    pub fn message(&self) -> &str {
        &self.condition.message
    }

    pub fn is_instant(&self) -> bool {
        self.from == self.to
    }

    /// Length of the interval.
    pub fn duration(&self) -> Duration {
        (self.to - self.from).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether two intervals share any instant of time.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.from < other.to && other.from < self.to
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from.format("%b %d %H:%M:%S%.3f");
        let message = self.condition.message.replace('\n', "\\n");
        if self.is_instant() {
            write!(
                f,
                "{} {} {} {}",
                from,
                self.condition.level.short(),
                self.condition.locator,
                message
            )
        } else {
            let secs = format!("{}s", self.duration().as_secs());
            write!(
                f,
                "{} - {:<5} {} {} {}",
                from,
                secs,
                self.condition.level.short(),
                self.condition.locator,
                message
            )
        }
    }
}

/// An ordered collection of intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Intervals(Vec<Interval>);

impl Intervals {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.0
    }

    /// Sort by start time, then end time. The sort is stable.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| a.from.cmp(&b.from).then(a.to.cmp(&b.to)));
    }

    /// Sum of interval lengths. Ranged intervals carrying the same condition
    /// are merged first when they touch or overlap, so an outage recorded in
    /// several pieces is measured as a whole. Merged intervals shorter than
    /// `floor` then count as zero.
    pub fn duration(&self, floor: Duration) -> Duration {
        self.merged()
            .iter()
            .map(Interval::duration)
            .filter(|d| *d >= floor)
            .sum()
    }

    /// Sorted copy in which touching or overlapping ranged intervals with the
    /// same condition are joined. Instants are kept unchanged.
    pub fn merged(&self) -> Intervals {
        let mut sorted = self.0.clone();
        sorted.sort_by(|a, b| a.from.cmp(&b.from).then(a.to.cmp(&b.to)));

        let mut out: Vec<Interval> = Vec::with_capacity(sorted.len());
        for interval in sorted {
            if !interval.is_instant() {
                let open = out
                    .iter_mut()
                    .rev()
                    .find(|prev| !prev.is_instant() && prev.condition == interval.condition);
                if let Some(prev) = open {
                    if interval.from <= prev.to {
                        prev.to = prev.to.max(interval.to);
                        continue;
                    }
                }
            }
            out.push(interval);
        }
        Intervals(out)
    }

    /// One human-readable line per interval.
    pub fn strings(&self) -> Vec<String> {
        self.0.iter().map(|i| i.to_string()).collect()
    }

    /// Intervals matching a predicate, in the current order.
    pub fn filter<F>(&self, mut predicate: F) -> Intervals
    where
        F: FnMut(&Interval) -> bool,
    {
        Intervals(self.0.iter().filter(|i| predicate(i)).cloned().collect())
    }

    /// Intervals starting within `[from, to)`. A `None` bound is open.
    pub fn slice(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Intervals {
        self.filter(|i| from.map_or(true, |f| i.from >= f) && to.map_or(true, |t| i.from < t))
    }

    /// Intervals whose locator is exactly `locator`.
    pub fn for_locator(&self, locator: &str) -> Intervals {
        self.filter(|i| i.condition.locator == locator)
    }
}

impl From<Vec<Interval>> for Intervals {
    fn from(intervals: Vec<Interval>) -> Self {
        Self(intervals)
    }
}

impl FromIterator<Interval> for Intervals {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Intervals {
    type Item = Interval;
    type IntoIter = std::vec::IntoIter<Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Intervals {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A serialized set of intervals, as written next to JUnit reports.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalsDocument {
    pub version: SchemaVersion,
    pub intervals: Intervals,
}

impl IntervalsDocument {
    pub fn new(intervals: Intervals) -> Self {
        Self {
            version: SchemaVersion::current(),
            intervals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn outage(from: DateTime<Utc>, to: DateTime<Utc>) -> Interval {
        Interval::new(Condition::error("disruption/svc", "down"), from, to)
    }

    #[test]
    fn new_clamps_inverted_range() {
        let i = outage(at(10), at(5));
        assert_eq!(i.to, i.from);
        assert_eq!(i.duration(), Duration::ZERO);
    }

    #[test]
    fn duration_applies_floor() {
        let intervals: Intervals = vec![
            outage(at_ms(0), at_ms(500)),
            outage(at_ms(1_000), at_ms(1_900)),
            outage(at_ms(2_000), at_ms(2_300)),
        ]
        .into();

        assert_eq!(intervals.duration(Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(intervals.duration(Duration::ZERO), Duration::from_millis(1_700));
    }

    #[test]
    fn duration_sums_intervals_above_floor() {
        let intervals: Intervals = vec![
            outage(at(0), at(3)),
            Interval::instant(Condition::info("disruption/svc", "up"), at(3)),
            outage(at(10), at(12)),
        ]
        .into();

        assert_eq!(intervals.duration(Duration::from_secs(1)), Duration::from_secs(5));
    }

    #[test]
    fn duration_measures_split_outage_as_a_whole() {
        // one 5s outage committed as ten 500ms pieces
        let intervals: Intervals = (0..10)
            .map(|n| outage(at_ms(n * 500), at_ms((n + 1) * 500)))
            .collect();

        assert_eq!(intervals.duration(Duration::from_secs(1)), Duration::from_secs(5));
    }

    #[test]
    fn merged_keeps_distinct_conditions_and_gaps_apart() {
        let intervals: Intervals = vec![
            outage(at(0), at(2)),
            Interval::new(Condition::error("disruption/other", "down"), at(2), at(4)),
            outage(at(2), at(3)),
            outage(at(5), at(6)),
            Interval::instant(Condition::error("disruption/svc", "down"), at(3)),
        ]
        .into();

        let merged = intervals.merged();
        assert_eq!(merged.len(), 4);
        let svc: Vec<_> = merged
            .iter()
            .filter(|i| i.locator() == "disruption/svc" && !i.is_instant())
            .map(|i| (i.from, i.to))
            .collect();
        assert_eq!(svc, vec![(at(0), at(3)), (at(5), at(6))]);
    }

    #[test]
    fn slice_is_half_open() {
        let intervals: Intervals = vec![
            outage(at(0), at(1)),
            outage(at(5), at(6)),
            outage(at(10), at(11)),
        ]
        .into();

        let sliced = intervals.slice(Some(at(5)), Some(at(10)));
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced.as_slice()[0].from, at(5));

        assert_eq!(intervals.slice(None, None).len(), 3);
        assert_eq!(intervals.slice(Some(at(1)), None).len(), 2);
        assert_eq!(intervals.slice(None, Some(at(1))).len(), 1);
    }

    #[test]
    fn sort_orders_by_start() {
        let mut intervals: Intervals = vec![outage(at(5), at(6)), outage(at(0), at(9))].into();
        intervals.sort();
        assert_eq!(intervals.as_slice()[0].from, at(0));
    }

    #[test]
    fn overlaps_excludes_touching_ranges() {
        assert!(outage(at(0), at(5)).overlaps(&outage(at(4), at(8))));
        assert!(!outage(at(0), at(5)).overlaps(&outage(at(5), at(8))));
    }

    #[test]
    fn display_renders_range_and_instant() {
        let ranged = outage(at(0), at(12)).to_string();
        assert!(ranged.contains(" - 12s"));
        assert!(ranged.contains("E disruption/svc down"));

        let instant = Interval::instant(Condition::info("disruption/svc", "a\nb"), at(0));
        let line = instant.to_string();
        assert!(line.ends_with("I disruption/svc a\\nb"));
        assert!(!line.contains(" - "));
    }

    #[test]
    fn for_locator_filters_exact_match() {
        let intervals: Intervals = vec![
            outage(at(0), at(1)),
            Interval::new(Condition::error("disruption/other", "down"), at(0), at(1)),
        ]
        .into();
        assert_eq!(intervals.for_locator("disruption/svc").len(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn document_serializes_flat_interval_fields() {
        let doc = IntervalsDocument::new(vec![outage(at(0), at(2))].into());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["version"]["major"], 1);
        let first = &json["intervals"][0];
        assert_eq!(first["level"], "Error");
        assert_eq!(first["locator"], "disruption/svc");
        assert!(first["from"].as_str().unwrap().starts_with("2023-11-14T22:13:20"));
    }
}
