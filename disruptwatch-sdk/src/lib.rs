//! # disruptwatch-sdk
//!
//! Sampling monitor for disruption testing.
//!
//! A [`Monitor`] owns a shared, time-ordered log of intervals. Each
//! [`Sampler`] polls a [`Probe`] on its own task and records state
//! transitions (and, optionally, how long the target stayed down) into that
//! log. After the disruptive operation finishes, the log is read back with
//! [`Monitor::intervals`] and evaluated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use disruptwatch_sdk::{Monitor, Probe};
//! use disruptwatch_types::Condition;
//! use std::time::Duration;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Probe for Ping {
//!     async fn probe(&mut self, previous_up: bool) -> (Option<Condition>, bool) {
//!         let up = true; // issue a request here
//!         let condition = match (previous_up, up) {
//!             (true, false) => Some(Condition::error("disruption/ping", "ping stopped responding")),
//!             (false, true) => Some(Condition::info("disruption/ping", "ping started responding")),
//!             _ => None,
//!         };
//!         (condition, up)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let monitor = Monitor::with_interval(Duration::from_secs(1));
//!     monitor.add_sampler(
//!         monitor
//!             .sampler(Ping)
//!             .when_failing(Condition::error("disruption/ping", "ping is not responding")),
//!     );
//!
//!     let sampling = monitor.start_sampling();
//!     // ... run the upgrade ...
//!     sampling.stop().await;
//!
//!     let disrupted = monitor.intervals(None, None).duration(Duration::from_secs(1));
//!     println!("disrupted for {:?}", disrupted);
//! }
//! ```
//!
//! ## Features
//!
//! - **Independent samplers**: a stalled probe delays only its own sampler
//! - **Shared stop signal**: one handle stops every sampler
//! - **Bounded outage records**: at most one "still failing" interval per period
//! - **Cancellation safe**: results of probes in flight at cancellation are dropped

mod handle;
mod monitor;
mod probe;
mod sampler;
mod state;

pub use handle::SamplingHandle;
pub use monitor::Monitor;
pub use probe::Probe;
pub use sampler::{Sampler, DEFAULT_CONTINUING_PERIOD};

// Re-export types for convenience
pub use disruptwatch_types::{Condition, Interval, Intervals, Level};
