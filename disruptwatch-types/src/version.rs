//! Version stamp of the `AdditionalEvents` summary files.
//!
//! Every interval document written next to a JUnit report starts with
//! `"version": {"major": .., "minor": ..}`. Readers that collect those files
//! after a run compare the major number before trusting the interval fields.

use core::fmt;

use crate::SCHEMA_VERSION;

/// Layout version of an [`IntervalsDocument`](crate::IntervalsDocument).
///
/// A new interval field bumps `minor`. Renaming or retyping `level`,
/// `locator`, `message`, `from` or `to` bumps `major`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The layout this crate writes.
    pub const fn current() -> Self {
        Self::new(SCHEMA_VERSION, 0)
    }

    /// Whether a document with this stamp can be read as the current layout.
    pub fn is_compatible(&self) -> bool {
        self.major == SCHEMA_VERSION
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Intervals, IntervalsDocument};

    #[test]
    fn new_documents_carry_a_readable_stamp() {
        let doc = IntervalsDocument::new(Intervals::new());
        assert!(doc.version.is_compatible());
        assert_eq!(doc.version.to_string(), format!("{SCHEMA_VERSION}.0"));
    }

    #[test]
    fn only_major_bumps_break_readers() {
        assert!(SchemaVersion::new(SCHEMA_VERSION, 3).is_compatible());
        assert!(!SchemaVersion::new(SCHEMA_VERSION + 1, 0).is_compatible());
    }
}
