//! HTTP availability checks.

use std::time::Duration;

use disruptwatch_types::ConnectionType;
use reqwest::Client;

use crate::ProbeError;

/// A single GET request whose response body must contain an expected string.
///
/// The connection type decides the client's pooling: a reused-connection
/// check keeps connections alive and so notices abrupt breaks, while a
/// new-connection check disables pooling and dials for every request.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    client: Client,
    url: String,
    expect_body: String,
    connection: ConnectionType,
}

impl HttpCheck {
    pub fn builder() -> HttpCheckBuilder {
        HttpCheckBuilder::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connection(&self) -> ConnectionType {
        self.connection
    }

    /// Issue one request.
    pub async fn check(&self) -> Result<(), ProbeError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }
        if !body.contains(&self.expect_body) {
            return Err(ProbeError::UnexpectedBody(body));
        }
        Ok(())
    }
}

/// Builder for [`HttpCheck`].
#[derive(Debug, Default)]
pub struct HttpCheckBuilder {
    url: Option<String>,
    expect_body: Option<String>,
    connection: Option<ConnectionType>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl HttpCheckBuilder {
    /// The URL to GET (required).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Text the response body must contain (default: "Hello").
    pub fn expect_body(mut self, text: impl Into<String>) -> Self {
        self.expect_body = Some(text.into());
        self
    }

    /// Connection reuse policy (default: reused).
    pub fn connection(mut self, connection: ConnectionType) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Whole-request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Dial timeout (default: 15 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpCheck, ProbeError> {
        let url = self
            .url
            .ok_or_else(|| ProbeError::Config("an HTTP check needs a URL".to_string()))?;
        let connection = self.connection.unwrap_or(ConnectionType::Reused);

        let builder = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .connect_timeout(self.connect_timeout.unwrap_or(Duration::from_secs(15)));
        let builder = match connection {
            ConnectionType::Reused => builder.tcp_keepalive(Duration::from_secs(15)),
            ConnectionType::New => builder
                .pool_max_idle_per_host(0)
                .pool_idle_timeout(Duration::from_secs(15))
                .tcp_keepalive(None),
        };

        Ok(HttpCheck {
            client: builder.build()?,
            url,
            expect_body: self.expect_body.unwrap_or_else(|| "Hello".to_string()),
            connection,
        })
    }
}

/// Join a host and port the way URLs need it, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
