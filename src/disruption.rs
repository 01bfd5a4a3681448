//! Evaluation of recorded disruption against a tolerance.

use std::time::Duration;

use disruptwatch_types::Intervals;
use tracing::info;

use crate::context::{TestContext, TestError};
use crate::duration::format_seconds;

/// Intervals shorter than this do not count towards disruption.
pub const MIN_COUNTED_INTERVAL: Duration = Duration::from_secs(1);

/// Fail if `intervals` cover more than `tolerate` (a fraction in [0, 1]) of
/// `total`; otherwise record a flake if they cover anything at all.
///
/// `reason` starts the message, which also lists every interval. The
/// intervals are attached to `ctx` in every case.
///
/// With `tolerate = 0.1` and a 10 minute `total`, more than one minute of
/// disruption fails, and anything from one second up to a minute is a flake.
pub fn expect_no_disruption(
    ctx: &mut TestContext,
    tolerate: f64,
    total: Duration,
    intervals: &Intervals,
    reason: &str,
) -> Result<(), TestError> {
    ctx.record_events(intervals.clone());

    let disrupted = intervals.duration(MIN_COUNTED_INTERVAL);
    let percent = if total.is_zero() {
        if disrupted.is_zero() {
            0.0
        } else {
            1.0
        }
    } else {
        disrupted.as_secs_f64() / total.as_secs_f64()
    };
    let describe = intervals.strings().join("\n");

    if percent > tolerate {
        return Err(TestError::Failed(format!(
            "{} for at least {} of {} ({:.0}%, but only {:.0}% is tolerated):\n\n{}",
            reason,
            format_seconds(disrupted),
            format_seconds(total),
            percent * 100.0,
            tolerate * 100.0,
            describe
        )));
    }

    if !disrupted.is_zero() {
        ctx.record_flake(format!(
            "{} for at least {} of {} ({:.0}%), this is currently sufficient to pass the \
             test/job but not considered completely correct.\nTolerating up to {:.0}% disruption:\n\n{}",
            reason,
            format_seconds(disrupted),
            format_seconds(total),
            percent * 100.0,
            tolerate * 100.0,
            describe
        ));
    } else {
        info!(test = ctx.name(), "{}: no disruption observed", reason);
    }

    Ok(())
}
