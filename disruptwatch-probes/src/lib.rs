//! # disruptwatch-probes
//!
//! Probes that feed a [`disruptwatch_sdk::Monitor`], plus the cluster API
//! lookups needed to find what to probe.
//!
//! ## Probes
//!
//! - [`HttpCheck`]: one GET request that must succeed and contain an expected body
//! - [`BackendDisruptionProbe`]: an `HttpCheck` reporting up/down transitions
//! - [`wait_until_reachable`]: blocks until a target answers N times in a row
//!
//! Reused-connection and new-connection checks are separate probes. Pooled
//! connections can hide failures that fresh dials would see, and the reverse.
//!
//! ## Example
//!
//! ```rust,no_run
//! use disruptwatch_probes::{BackendDisruptionProbe, HttpCheck};
//! use disruptwatch_sdk::Monitor;
//! use disruptwatch_types::ConnectionType;
//!
//! # fn example() -> Result<(), disruptwatch_probes::ProbeError> {
//! let monitor = Monitor::new();
//! for connection in [ConnectionType::Reused, ConnectionType::New] {
//!     let check = HttpCheck::builder()
//!         .url("http://10.0.0.5:80/echo?msg=Hello")
//!         .connection(connection)
//!         .build()?;
//!     let probe = BackendDisruptionProbe::new("service-lb", check);
//!     let still_failing = probe.still_failing();
//!     monitor.add_sampler(monitor.sampler(probe).when_failing(still_failing));
//! }
//! # Ok(())
//! # }
//! ```

mod cluster;
mod disruption;
mod error;
mod http;
mod reachability;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

pub use cluster::{
    ClusterClient, ClusterClientBuilder, Infrastructure, InfrastructureStatus, PlatformStatus,
    PlatformType, ServiceEndpoint, TopologyMode,
};
pub use disruption::BackendDisruptionProbe;
pub use error::ProbeError;
pub use http::{join_host_port, HttpCheck, HttpCheckBuilder};
pub use reachability::wait_until_reachable;
