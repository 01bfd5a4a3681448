//! Error types for probes and cluster lookups.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when probing a target or querying the cluster API.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// The server answered successfully but with the wrong content.
    #[error("service returned success but did not contain the correct body contents: {0:?}")]
    UnexpectedBody(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The requested object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The object exists but is not usable yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The target never produced enough consecutive successes.
    #[error("target was not reachable for {required} consecutive requests within {timeout:?}")]
    NotReachable { required: u32, timeout: Duration },

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Connection(err.to_string())
        } else if err.is_decode() {
            ProbeError::Parse(err.to_string())
        } else if err.is_builder() {
            ProbeError::Config(err.to_string())
        } else {
            ProbeError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        assert_eq!(ProbeError::Status(503).to_string(), "server returned status 503");
        assert_eq!(
            ProbeError::UnexpectedBody("nope".to_string()).to_string(),
            "service returned success but did not contain the correct body contents: \"nope\""
        );
        let err = ProbeError::NotReachable {
            required: 30,
            timeout: Duration::from_secs(600),
        };
        assert!(err.to_string().contains("30 consecutive requests"));
    }
}
