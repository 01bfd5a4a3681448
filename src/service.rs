//! Availability of an application behind a load-balanced Service.

use async_trait::async_trait;
use disruptwatch_probes::{wait_until_reachable, BackendDisruptionProbe, ClusterClient, HttpCheck};
use disruptwatch_sdk::Monitor;
use disruptwatch_types::ConnectionType;
use tokio::time::Instant;
use tracing::info;

use crate::config::{ClusterSettings, Settings};
use crate::context::{TestContext, TestError};
use crate::disruption::expect_no_disruption;
use crate::runner::{Capabilities, DisruptionTest, Done, UpgradeContext};

pub const SERVICE_TEST_NAME: &str = "k8s-service-lb-available";
pub const SERVICE_TEST_DISPLAY_NAME: &str =
    "[sig-network-edge] Application behind service load balancer with PDB is not disrupted";

/// Backend name used in disruption locators.
const BACKEND: &str = "service-loadbalancer-with-pdb";
const REASON: &str = "Service was unreachable during disruption";

/// Probes a Service's load balancer over reused and new connections for the
/// whole disruption, then checks the outage against `settings.tolerance`.
#[derive(Debug)]
pub struct ServiceAvailabilityTest {
    settings: Settings,
    url: Option<String>,
    unsupported: bool,
}

impl ServiceAvailabilityTest {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            url: None,
            unsupported: false,
        }
    }

    /// The URL being probed, once setup has resolved it.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// True if setup found a platform without load-balanced Services.
    pub fn is_unsupported(&self) -> bool {
        self.unsupported
    }

    fn cluster_client(cluster: &ClusterSettings) -> Result<ClusterClient, TestError> {
        let mut builder = ClusterClient::builder()
            .api_server(&cluster.api_server)
            .accept_invalid_certs(cluster.accept_invalid_certs);
        if let Some(token) = &cluster.token {
            builder = builder.token(token);
        }
        Ok(builder.build()?)
    }

    /// Resolve the URL to probe, or `None` on an unsupported platform.
    async fn resolve_url(&self) -> Result<Option<String>, TestError> {
        let Some(cluster) = &self.settings.target.cluster else {
            return self
                .settings
                .target
                .url
                .clone()
                .map(Some)
                .ok_or_else(|| {
                    TestError::failed("no target configured: set target.url or target.cluster")
                });
        };

        let client = Self::cluster_client(cluster)?;
        let infra = client.infrastructure().await?;
        if !infra.supports_service_load_balancers() {
            info!(
                platform = ?infra.platform(),
                "service load balancers are not supported on this cluster"
            );
            return Ok(None);
        }

        match &self.settings.target.url {
            Some(url) => Ok(Some(url.clone())),
            None => {
                let endpoint = client
                    .service_endpoint(&cluster.namespace, &cluster.service)
                    .await?;
                Ok(Some(endpoint.echo_url()))
            }
        }
    }

    fn check(&self, url: &str, connection: ConnectionType) -> Result<HttpCheck, TestError> {
        Ok(HttpCheck::builder()
            .url(url)
            .connection(connection)
            .timeout(self.settings.probe_timeout)
            .build()?)
    }
}

#[async_trait]
impl DisruptionTest for ServiceAvailabilityTest {
    fn name(&self) -> &str {
        SERVICE_TEST_NAME
    }

    fn capabilities(&self, _upgrade: &UpgradeContext) -> Capabilities {
        Capabilities {
            display_name: Some(SERVICE_TEST_DISPLAY_NAME.to_string()),
            ..Default::default()
        }
    }

    async fn setup(&mut self, _ctx: &mut TestContext) -> Result<(), TestError> {
        let Some(url) = self.resolve_url().await? else {
            self.unsupported = true;
            return Ok(());
        };

        info!("hitting pods through the service's load balancer at {}", url);
        let check = self.check(&url, ConnectionType::Reused)?;
        wait_until_reachable(
            &check,
            self.settings.min_success_count,
            self.settings.sample_interval,
            self.settings.reachability_timeout,
        )
        .await?;

        self.url = Some(url);
        Ok(())
    }

    async fn test(&mut self, ctx: &mut TestContext, mut done: Done) -> Result<(), TestError> {
        if self.unsupported {
            return Ok(());
        }
        let url = self
            .url
            .clone()
            .ok_or_else(|| TestError::failed("setup did not resolve a target URL"))?;

        let monitor = Monitor::with_interval(self.settings.sample_interval);
        for connection in [ConnectionType::Reused, ConnectionType::New] {
            let probe = BackendDisruptionProbe::new(BACKEND, self.check(&url, connection)?);
            let still_failing = probe.still_failing();
            monitor.add_sampler(
                monitor
                    .sampler(probe)
                    .when_failing(still_failing)
                    .continuing_period(self.settings.continuing_period),
            );
        }

        info!("continuously hitting pods through the service's load balancer");
        let start = Instant::now();
        let sampling = monitor.start_sampling();

        done.wait().await;
        info!("waiting for any post disruption failures");
        tokio::time::sleep(self.settings.settle_period).await;
        sampling.cancel();
        let total = start.elapsed();
        sampling.stop().await;

        expect_no_disruption(
            ctx,
            self.settings.tolerance,
            total,
            &monitor.intervals(None, None),
            REASON,
        )
    }
}
