//! # disruptwatch-types
//!
//! Core types for disruption monitoring. This crate defines the records that
//! samplers write into a monitor's log and that the harness evaluates once a
//! disruptive operation (for example a cluster upgrade) has finished.
//!
//! ## Design Goals
//!
//! - **Small surface**: conditions, intervals and locators, nothing else
//! - **Optional serialization**: enable the `serde` feature to write intervals as JSON
//! - **Readable output**: every interval renders as a single human-readable line
//! - **Versioned documents**: serialized interval sets carry a schema version
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde (also enables chrono's serde support)
//!
//! ## Example
//!
//! ```rust
//! use disruptwatch_types::{locator, Condition, ConnectionType, Interval, Intervals};
//! use chrono::{TimeZone, Utc};
//! use std::time::Duration;
//!
//! let locator = locator::locate_disruption_check("service-lb", ConnectionType::Reused);
//! let from = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
//! let to = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 12).unwrap();
//!
//! let intervals: Intervals = vec![Interval::new(
//!     Condition::error(locator, "service-lb is not responding"),
//!     from,
//!     to,
//! )]
//! .into();
//!
//! assert_eq!(intervals.duration(Duration::from_secs(1)), Duration::from_secs(12));
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. It is embedded in every
//! [`IntervalsDocument`] so readers of old report directories can tell formats apart.

mod condition;
mod interval;
pub mod locator;
mod version;

pub use condition::*;
pub use interval::*;
pub use locator::ConnectionType;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the serialized interval format.
pub const SCHEMA_VERSION: u32 = 1;
