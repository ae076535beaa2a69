//! Blocking client for the Maxine registry.
//!
//! # Design
//! `MaxineClient` holds a `RequestBuilder` and a `Transport` and nothing
//! else: no caches, no background work, no mutable state. Each operation is
//! one round-trip built by `RequestBuilder::build_*`, executed by the
//! transport, and mapped by the matching `response::parse_*` function.
//! Failures are logged once here and returned as `ApiError`.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::request::RequestBuilder;
use crate::response;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Anomaly, DiscoverQuery, HealthScore, NodeId, Registration, Service, ServiceNode};

/// Synchronous client bound to one registry base URL.
pub struct MaxineClient<T = UreqTransport> {
    requests: RequestBuilder,
    transport: T,
}

impl MaxineClient<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(&config, transport)
    }
}

impl<T: Transport> MaxineClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self {
            requests: RequestBuilder::from_config(config),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        self.requests.base_url()
    }

    pub fn request_builder(&self) -> &RequestBuilder {
        &self.requests
    }

    /// Discover one healthy node of a service.
    pub fn discover_lightning(&self, query: &DiscoverQuery) -> Result<ServiceNode> {
        let request = self.requests.build_discover(query);
        self.call("discover", Ok(request), response::parse_discover)
    }

    /// Register an instance and return the registry-issued node id.
    pub fn register_lightning(&self, registration: &Registration) -> Result<NodeId> {
        let request = self.requests.build_register(registration);
        self.call("register", request, response::parse_register)
    }

    /// `Ok(false)` means the registry answered but did not acknowledge the
    /// node. Whether it expired or the server hit a transient problem cannot
    /// be told apart from here.
    pub fn heartbeat_lightning(&self, node_id: &NodeId) -> Result<bool> {
        let request = self.requests.build_heartbeat(node_id);
        self.call("heartbeat", request, response::parse_heartbeat)
    }

    pub fn deregister_lightning(&self, node_id: &NodeId) -> Result<()> {
        let request = self.requests.build_deregister(node_id);
        self.call("deregister", request, response::parse_deregister)
    }

    /// Names of every service with at least one registered node.
    pub fn servers_lightning(&self) -> Result<Vec<String>> {
        let request = self.requests.build_servers();
        self.call("servers", Ok(request), response::parse_servers)
    }

    pub fn health_lightning(&self) -> Result<Value> {
        let request = self.requests.build_health();
        self.call("health", Ok(request), response::parse_document)
    }

    pub fn metrics_lightning(&self) -> Result<Value> {
        let request = self.requests.build_metrics();
        self.call("metrics", Ok(request), response::parse_document)
    }

    pub fn services(&self) -> Result<Vec<Service>> {
        let request = self.requests.build_services();
        self.call("services", Ok(request), response::parse_services)
    }

    pub fn service(&self, service_name: &str) -> Result<Service> {
        let request = self.requests.build_service(service_name);
        self.call("service", Ok(request), response::parse_service)
    }

    pub fn health_scores(&self, service_name: &str) -> Result<Vec<HealthScore>> {
        let request = self.requests.build_health_scores(service_name);
        self.call("health_scores", Ok(request), response::parse_health_scores)
    }

    pub fn anomalies(&self) -> Result<Vec<Anomaly>> {
        let request = self.requests.build_anomalies();
        self.call("anomalies", Ok(request), response::parse_anomalies)
    }

    pub fn versions(&self, service_name: &str) -> Result<Vec<String>> {
        let request = self.requests.build_versions(service_name);
        self.call("versions", Ok(request), response::parse_versions)
    }

    fn call<R>(
        &self,
        operation: &'static str,
        request: Result<HttpRequest>,
        parse: fn(HttpResponse) -> Result<R>,
    ) -> Result<R> {
        let result = request
            .and_then(|request| {
                debug!(operation, method = request.method.as_str(), url = %request.url, "registry request");
                self.transport.execute(&request)
            })
            .and_then(parse);
        if let Err(err) = &result {
            warn!(operation, error = %err, "registry call failed");
        }
        result
    }
}
