//! Read-only cluster API lookups.
//!
//! Two questions are asked of the cluster: what platform it runs on (some
//! platforms cannot provision load-balanced Services) and where a Service's
//! load balancer can be reached.
//!
//! # Example
//!
//! ```rust,no_run
//! use disruptwatch_probes::ClusterClient;
//!
//! # async fn example() -> Result<(), disruptwatch_probes::ProbeError> {
//! let client = ClusterClient::builder()
//!     .api_server("https://api.cluster.example.com:6443")
//!     .token("sha256~...")
//!     .build()?;
//!
//! let infra = client.infrastructure().await?;
//! if infra.supports_service_load_balancers() {
//!     let endpoint = client.service_endpoint("e2e-k8s-service-lb-available", "service-test").await?;
//!     println!("probing {}", endpoint.echo_url());
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::http::join_host_port;
use crate::ProbeError;

const INFRASTRUCTURE_PATH: &str = "/apis/config.openshift.io/v1/infrastructures/cluster";

/// Client for the cluster's REST API.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    client: Client,
    api_server: String,
    token: Option<String>,
}

impl ClusterClient {
    pub fn builder() -> ClusterClientBuilder {
        ClusterClientBuilder::default()
    }

    pub fn api_server(&self) -> &str {
        &self.api_server
    }

    /// Fetch the cluster-scoped infrastructure object.
    pub async fn infrastructure(&self) -> Result<Infrastructure, ProbeError> {
        self.get_json(INFRASTRUCTURE_PATH).await
    }

    /// Resolve where a LoadBalancer Service can be reached.
    ///
    /// Uses the first ingress point (IP before hostname) and the first port.
    /// A Service without ingress or ports is reported as not ready.
    pub async fn service_endpoint(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceEndpoint, ProbeError> {
        let path = format!("/api/v1/namespaces/{}/services/{}", namespace, name);
        let service: Service = self.get_json(&path).await?;
        service.endpoint().ok_or_else(|| {
            ProbeError::NotReady(format!(
                "service {}/{} has no load balancer ingress or ports",
                namespace, name
            ))
        })
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.api_server, path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProbeError> {
        debug!(path, "querying cluster API");
        let response = self.request(path).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProbeError::Auth(format!(
                    "cluster API refused {} with status {}",
                    path,
                    response.status()
                )));
            }
            StatusCode::NOT_FOUND => return Err(ProbeError::NotFound(path.to_string())),
            status if !status.is_success() => {
                return Err(ProbeError::Http(format!(
                    "cluster API returned status {} for {}",
                    status, path
                )));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| ProbeError::Parse(e.to_string()))
    }
}

/// Builder for [`ClusterClient`].
#[derive(Debug, Default)]
pub struct ClusterClientBuilder {
    api_server: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    accept_invalid_certs: bool,
}

impl ClusterClientBuilder {
    /// API server base URL (required), e.g. "https://api.example.com:6443".
    pub fn api_server(mut self, url: impl Into<String>) -> Self {
        self.api_server = Some(url.into());
        self
    }

    /// Bearer token sent with every request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Request timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skip TLS verification. Test clusters often use self-signed certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<ClusterClient, ProbeError> {
        let api_server = self
            .api_server
            .ok_or_else(|| ProbeError::Config("a cluster client needs an API server URL".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(ClusterClient {
            client,
            api_server: api_server.trim_end_matches('/').to_string(),
            token: self.token,
        })
    }
}

/// The `infrastructures.config.openshift.io/cluster` object, reduced to what
/// the harness reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Infrastructure {
    #[serde(default)]
    pub status: InfrastructureStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    #[serde(default)]
    pub platform_status: Option<PlatformStatus>,
    #[serde(default)]
    pub control_plane_topology: Option<TopologyMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformStatus {
    #[serde(rename = "type")]
    pub platform: PlatformType,
}

/// Infrastructure provider. Unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PlatformType {
    Aws,
    Azure,
    Gcp,
    BareMetal,
    Libvirt,
    Ovirt,
    KubeVirt,
    VSphere,
    None,
    Other(String),
}

impl From<String> for PlatformType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "AWS" => PlatformType::Aws,
            "Azure" => PlatformType::Azure,
            "GCP" => PlatformType::Gcp,
            "BareMetal" => PlatformType::BareMetal,
            "Libvirt" => PlatformType::Libvirt,
            "oVirt" => PlatformType::Ovirt,
            "KubeVirt" => PlatformType::KubeVirt,
            "VSphere" => PlatformType::VSphere,
            "None" => PlatformType::None,
            _ => PlatformType::Other(name),
        }
    }
}

/// Control plane topology.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TopologyMode {
    HighlyAvailable,
    SingleReplica,
    External,
    Other(String),
}

impl From<String> for TopologyMode {
    fn from(name: String) -> Self {
        match name.as_str() {
            "HighlyAvailable" => TopologyMode::HighlyAvailable,
            "SingleReplica" => TopologyMode::SingleReplica,
            "External" => TopologyMode::External,
            _ => TopologyMode::Other(name),
        }
    }
}

impl Infrastructure {
    pub fn platform(&self) -> Option<&PlatformType> {
        self.status.platform_status.as_ref().map(|p| &p.platform)
    }

    /// Whether load-balanced Services can be expected to work here.
    pub fn supports_service_load_balancers(&self) -> bool {
        let unsupported_platform = matches!(
            self.platform(),
            Some(
                PlatformType::Ovirt
                    | PlatformType::KubeVirt
                    | PlatformType::Libvirt
                    | PlatformType::VSphere
                    | PlatformType::BareMetal
            )
        );
        let single_replica =
            self.status.control_plane_topology == Some(TopologyMode::SingleReplica);

        !unsupported_platform && !single_replica
    }
}

/// Where a load-balanced Service answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    /// The echo URL the availability probes request.
    pub fn echo_url(&self) -> String {
        format!("http://{}/echo?msg=Hello", join_host_port(&self.host, self.port))
    }
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(default)]
    spec: ServiceSpec,
    #[serde(default)]
    status: ServiceStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceSpec {
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Debug, Deserialize)]
struct ServicePort {
    port: u16,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceStatus {
    #[serde(default)]
    load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Default, Deserialize)]
struct LoadBalancerStatus {
    #[serde(default)]
    ingress: Vec<LoadBalancerIngress>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerIngress {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
}

impl Service {
    fn endpoint(&self) -> Option<ServiceEndpoint> {
        let ingress = self.status.load_balancer.ingress.first()?;
        let host = ingress
            .ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or(ingress.hostname.as_deref())
            .filter(|host| !host.is_empty())?;
        let port = self.spec.ports.first()?.port;

        Some(ServiceEndpoint {
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use hyper::StatusCode as HyperStatus;

    fn infra(json: serde_json::Value) -> Infrastructure {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn unsupported_platforms() {
        for platform in ["oVirt", "KubeVirt", "Libvirt", "VSphere", "BareMetal"] {
            let infra = infra(serde_json::json!({
                "status": { "platformStatus": { "type": platform } }
            }));
            assert!(!infra.supports_service_load_balancers(), "{}", platform);
        }
    }

    #[test]
    fn cloud_platforms_are_supported() {
        let aws = infra(serde_json::json!({
            "status": {
                "platformStatus": { "type": "AWS" },
                "controlPlaneTopology": "HighlyAvailable"
            }
        }));
        assert_eq!(aws.platform(), Some(&PlatformType::Aws));
        assert!(aws.supports_service_load_balancers());

        let unknown = infra(serde_json::json!({
            "status": { "platformStatus": { "type": "Nutanix" } }
        }));
        assert_eq!(unknown.platform(), Some(&PlatformType::Other("Nutanix".to_string())));
        assert!(unknown.supports_service_load_balancers());
    }

    #[test]
    fn single_replica_is_unsupported() {
        let sno = infra(serde_json::json!({
            "status": {
                "platformStatus": { "type": "AWS" },
                "controlPlaneTopology": "SingleReplica"
            }
        }));
        assert!(!sno.supports_service_load_balancers());
    }

    #[test]
    fn service_endpoint_prefers_ip() {
        let service: Service = serde_json::from_value(serde_json::json!({
            "spec": { "ports": [{ "port": 80 }, { "port": 443 }] },
            "status": { "loadBalancer": { "ingress": [
                { "ip": "fd00::10", "hostname": "lb.example.com" }
            ] } }
        }))
        .unwrap();

        let endpoint = service.endpoint().unwrap();
        assert_eq!(endpoint.port, 80);
        assert_eq!(endpoint.echo_url(), "http://[fd00::10]:80/echo?msg=Hello");
    }

    #[test]
    fn service_endpoint_falls_back_to_hostname() {
        let service: Service = serde_json::from_value(serde_json::json!({
            "spec": { "ports": [{ "port": 8080 }] },
            "status": { "loadBalancer": { "ingress": [{ "hostname": "lb.example.com" }] } }
        }))
        .unwrap();

        assert_eq!(
            service.endpoint().unwrap().echo_url(),
            "http://lb.example.com:8080/echo?msg=Hello"
        );
    }

    #[test]
    fn service_without_ingress_has_no_endpoint() {
        let service: Service = serde_json::from_value(serde_json::json!({
            "spec": { "ports": [{ "port": 80 }] }
        }))
        .unwrap();
        assert!(service.endpoint().is_none());
    }

    #[test]
    fn builder_requires_api_server() {
        assert!(matches!(ClusterClient::builder().build(), Err(ProbeError::Config(_))));
        let client = ClusterClient::builder()
            .api_server("https://api.example.com:6443/")
            .build()
            .unwrap();
        assert_eq!(client.api_server(), "https://api.example.com:6443");
    }

    #[tokio::test]
    async fn queries_cluster_api() {
        let addr = serve(|path| match path {
            "/apis/config.openshift.io/v1/infrastructures/cluster" => (
                HyperStatus::OK,
                r#"{"status":{"platformStatus":{"type":"GCP"},"controlPlaneTopology":"HighlyAvailable"}}"#
                    .to_string(),
            ),
            "/api/v1/namespaces/e2e/services/service-test" => (
                HyperStatus::OK,
                r#"{"spec":{"ports":[{"port":80}]},"status":{"loadBalancer":{"ingress":[{"ip":"10.0.0.5"}]}}}"#
                    .to_string(),
            ),
            "/api/v1/namespaces/e2e/services/pending" => (
                HyperStatus::OK,
                r#"{"spec":{"ports":[{"port":80}]},"status":{"loadBalancer":{}}}"#.to_string(),
            ),
            _ => (HyperStatus::NOT_FOUND, "{}".to_string()),
        })
        .await
        .unwrap();

        let client = ClusterClient::builder()
            .api_server(format!("http://{}", addr))
            .token("secret")
            .build()
            .unwrap();

        let infra = client.infrastructure().await.unwrap();
        assert_eq!(infra.platform(), Some(&PlatformType::Gcp));
        assert!(infra.supports_service_load_balancers());

        let endpoint = client.service_endpoint("e2e", "service-test").await.unwrap();
        assert_eq!(
            endpoint,
            ServiceEndpoint {
                host: "10.0.0.5".to_string(),
                port: 80
            }
        );

        assert!(matches!(
            client.service_endpoint("e2e", "pending").await,
            Err(ProbeError::NotReady(_))
        ));
        assert!(matches!(
            client.service_endpoint("e2e", "missing").await,
            Err(ProbeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reports_auth_failures() {
        let addr = serve(|_| (HyperStatus::UNAUTHORIZED, "{}".to_string())).await.unwrap();
        let client = ClusterClient::builder()
            .api_server(format!("http://{}", addr))
            .build()
            .unwrap();

        assert!(matches!(client.infrastructure().await, Err(ProbeError::Auth(_))));
    }
}
