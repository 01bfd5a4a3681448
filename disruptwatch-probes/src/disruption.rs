//! Disruption probes - HTTP checks wired into the sampler state machine.

use async_trait::async_trait;
use disruptwatch_sdk::Probe;
use disruptwatch_types::locator::{
    disruption_began_message, disruption_continuing_message, disruption_ended_message,
    locate_disruption_check,
};
use disruptwatch_types::{Condition, ConnectionType};
use tracing::warn;

use crate::http::HttpCheck;

/// Probes one backend over one connection type and reports transitions.
///
/// A failed check after a successful one yields an Error-level "began"
/// condition, a successful check after a failed one yields an Info-level
/// "ended" condition, and anything else yields no condition.
#[derive(Debug, Clone)]
pub struct BackendDisruptionProbe {
    backend: String,
    locator: String,
    check: HttpCheck,
}

impl BackendDisruptionProbe {
    pub fn new(backend: impl Into<String>, check: HttpCheck) -> Self {
        let backend = backend.into();
        let locator = locate_disruption_check(&backend, check.connection());
        Self {
            backend,
            locator,
            check,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn connection(&self) -> ConnectionType {
        self.check.connection()
    }

    /// The condition a sampler should record while this backend stays down.
    pub fn still_failing(&self) -> Condition {
        Condition::error(
            self.locator.clone(),
            disruption_continuing_message(&self.locator, self.connection()),
        )
    }
}

#[async_trait]
impl Probe for BackendDisruptionProbe {
    async fn probe(&mut self, previous_up: bool) -> (Option<Condition>, bool) {
        let result = self.check.check().await;
        let connection = self.connection();

        let condition = match (&result, previous_up) {
            (Ok(()), false) => Some(Condition::info(
                self.locator.clone(),
                disruption_ended_message(&self.locator, connection),
            )),
            (Err(e), true) => {
                warn!(
                    "{} is unreachable on {} connections: {}",
                    self.backend, connection, e
                );
                Some(Condition::error(
                    self.locator.clone(),
                    disruption_began_message(&self.locator, connection, e),
                ))
            }
            (Err(e), false) => {
                warn!(
                    "{} is unreachable on {} connections: {}",
                    self.backend, connection, e
                );
                None
            }
            (Ok(()), true) => None,
        };

        (condition, result.is_ok())
    }
}
