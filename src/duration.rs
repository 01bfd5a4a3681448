use std::time::Duration;

use thiserror::Error;

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

#[derive(Debug, Error)]
#[error("Unknown duration format: {0:?}")]
pub struct DurationError(pub String);

/// Parse duration strings like "1s", "500ms", "1.5m", "16.958µs", "0ns"
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str
                .parse()
                .map_err(|_| DurationError(s.to_string()))?;
            if !val.is_finite() || val < 0.0 {
                return Err(DurationError(s.to_string()));
            }
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    Err(DurationError(s.to_string()))
}

/// Whole seconds, truncated: "600s", "0s".
pub fn format_seconds(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

/// Format a duration for display
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0ns".to_string()
    } else if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
