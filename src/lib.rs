//! # disruptwatch
//!
//! Measures how available a service stays while a disruptive cluster
//! operation (typically an upgrade) runs, and reports the result as JUnit.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ runner::run                                                  │
//! │   setup all tests ──▶ disruption ──▶ done ──▶ finalize cases │
//! │        │                               │                     │
//! │        ▼                               ▼                     │
//! │  ┌───────────┐   samplers   ┌───────────────────┐            │
//! │  │  Monitor  │◀─────────────│ HTTP probes       │            │
//! │  │ (log)     │              │ (reused / new)    │            │
//! │  └─────┬─────┘              └───────────────────┘            │
//! │        ▼                                                     │
//! │  expect_no_disruption ──▶ TestContext ──▶ junit::TestSuite   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`runner`]**: registers [`DisruptionTest`]s, runs the disruption once
//!   they are ready, and turns outcomes into a [`TestSuite`]
//! - **[`disruption`]**: [`expect_no_disruption`], the tolerance check
//! - **[`context`]**: per-test summaries (flakes, sub-tests, evaluated intervals)
//! - **[`junit`]**: the report model and its XML form
//! - **[`service`]**: availability of an application behind a load-balanced Service
//! - **[`config`]**: layered [`Settings`]
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Probe a URL while an upgrade command runs
//! disruptwatch run --url http://10.0.0.5/echo?msg=Hello --report-dir _output -- oc adm upgrade --to-latest
//!
//! # Probe a Service's load balancer for ten minutes
//! DISRUPTWATCH_TARGET__CLUSTER__API_SERVER=https://api.example.com:6443 \
//! DISRUPTWATCH_TARGET__CLUSTER__NAMESPACE=e2e \
//!     disruptwatch run --upgrade-duration 10m
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use disruptwatch::{run, wait_disruption, DisruptionTest, ServiceAvailabilityTest, Settings, UpgradeContext};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None).unwrap();
//! let tests: Vec<Box<dyn DisruptionTest>> =
//!     vec![Box::new(ServiceAvailabilityTest::new(settings.clone()))];
//!
//! let suite = run(
//!     &settings,
//!     "Cluster upgrade",
//!     "upgrade",
//!     &UpgradeContext::default(),
//!     tests,
//!     wait_disruption(Duration::from_secs(600)),
//! )
//! .await;
//! assert!(suite.hard_failures().is_empty());
//! # });
//! ```

pub mod config;
pub mod context;
pub mod disruption;
pub mod duration;
pub mod junit;
pub mod runner;
pub mod service;

// Re-export main types for convenience
pub use config::{ConfigError, Settings};
pub use context::{AdditionalTest, Outcome, Summary, TestContext, TestError};
pub use disruption::expect_no_disruption;
pub use junit::{ReportError, TestCase, TestSuite};
pub use runner::{
    command_disruption, run, wait_disruption, Capabilities, DisruptionTest, Done, UpgradeContext,
    UpgradeKind,
};
pub use service::ServiceAvailabilityTest;
