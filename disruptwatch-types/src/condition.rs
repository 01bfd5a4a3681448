//! Conditions - what was observed about a monitored target.

use core::fmt;

/// Severity of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Level {
    #[default]
    Info,
    Warning,
    Error,
}

impl Level {
    /// Single-letter form used in interval lines.
    pub fn short(&self) -> char {
        match self {
            Level::Info => 'I',
            Level::Warning => 'W',
            Level::Error => 'E',
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("Info"),
            Level::Warning => f.write_str("Warning"),
            Level::Error => f.write_str("Error"),
        }
    }
}

/// A single observation about something identified by a locator.
///
/// Conditions carry no time; they become [`Interval`](crate::Interval)s once a
/// monitor stamps them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    pub level: Level,
    pub locator: String,
    pub message: String,
}

impl Condition {
    pub fn new(level: Level, locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            locator: locator.into(),
            message: message.into(),
        }
    }

    pub fn info(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Info, locator, message)
    }

    pub fn warning(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, locator, message)
    }

    pub fn error(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Error, locator, message)
    }
}
