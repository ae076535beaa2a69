//! Request builder: typed inputs in, wire-ready `HttpRequest` values out.
//!
//! Optional discovery filters are appended only when set, query values are
//! form-urlencoded, and the credential header is attached to every request
//! when one is configured.

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::types::{DiscoverQuery, NodeId, Registration};

pub const API_KEY_HEADER: &str = "X-API-Key";

pub const DISCOVER_PATH: &str = "/discover";
pub const REGISTER_PATH: &str = "/register";
pub const HEARTBEAT_PATH: &str = "/heartbeat";
pub const DEREGISTER_PATH: &str = "/deregister";
pub const SERVERS_PATH: &str = "/servers";
pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";
pub const SERVICES_PATH: &str = "/api/maxine/serviceops/services";
pub const SERVICE_PATH: &str = "/api/maxine/serviceops/service";
pub const HEALTH_SCORE_PATH: &str = "/api/maxine/serviceops/health-score";
pub const ANOMALIES_PATH: &str = "/api/maxine/serviceops/anomalies";
pub const VERSIONS_PATH: &str = "/api/maxine/serviceops/versions";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    service_name: &'a str,
    host: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeIdBody<'a> {
    node_id: &'a str,
}

/// Builds requests against one registry base URL.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    api_key: Option<String>,
}

impl RequestBuilder {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()).map(str::to_string),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url(), config.api_key())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_discover(&self, query: &DiscoverQuery) -> HttpRequest {
        let mut target = format!(
            "{DISCOVER_PATH}?serviceName={}",
            encode(&query.service_name)
        );
        if !query.load_balancing.is_empty() {
            target.push_str("&loadBalancing=");
            target.push_str(&encode(&query.load_balancing));
        }
        if !query.version.is_empty() {
            target.push_str("&version=");
            target.push_str(&encode(&query.version));
        }
        if !query.tags.is_empty() {
            let tags: Vec<String> = query.tags.iter().map(|tag| encode(tag)).collect();
            target.push_str("&tags=");
            target.push_str(&tags.join(","));
        }
        self.get(&target)
    }

    pub fn build_register(&self, registration: &Registration) -> Result<HttpRequest> {
        let body = RegisterBody {
            service_name: &registration.service_name,
            host: &registration.host,
            port: registration.port,
            metadata: registration.metadata.as_ref().filter(|m| !m.is_null()),
        };
        self.json(HttpMethod::Post, REGISTER_PATH, &body)
    }

    pub fn build_heartbeat(&self, node_id: &NodeId) -> Result<HttpRequest> {
        let body = NodeIdBody {
            node_id: node_id.as_str(),
        };
        self.json(HttpMethod::Post, HEARTBEAT_PATH, &body)
    }

    pub fn build_deregister(&self, node_id: &NodeId) -> Result<HttpRequest> {
        let body = NodeIdBody {
            node_id: node_id.as_str(),
        };
        self.json(HttpMethod::Delete, DEREGISTER_PATH, &body)
    }

    pub fn build_servers(&self) -> HttpRequest {
        self.get(SERVERS_PATH)
    }

    pub fn build_health(&self) -> HttpRequest {
        self.get(HEALTH_PATH)
    }

    pub fn build_metrics(&self) -> HttpRequest {
        self.get(METRICS_PATH)
    }

    pub fn build_services(&self) -> HttpRequest {
        self.get(SERVICES_PATH)
    }

    pub fn build_service(&self, service_name: &str) -> HttpRequest {
        self.get(&with_service_name(SERVICE_PATH, service_name))
    }

    pub fn build_health_scores(&self, service_name: &str) -> HttpRequest {
        self.get(&with_service_name(HEALTH_SCORE_PATH, service_name))
    }

    pub fn build_anomalies(&self) -> HttpRequest {
        self.get(ANOMALIES_PATH)
    }

    pub fn build_versions(&self, service_name: &str) -> HttpRequest {
        self.get(&with_service_name(VERSIONS_PATH, service_name))
    }

    fn get(&self, target: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}{target}", self.base_url),
            headers: self.headers(false),
            body: None,
        }
    }

    fn json<T: Serialize>(&self, method: HttpMethod, path: &str, body: &T) -> Result<HttpRequest> {
        let body =
            serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers: self.headers(true),
            body: Some(body),
        })
    }

    fn headers(&self, has_body: bool) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(2);
        if has_body {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(key) = &self.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }
        headers
    }
}

fn with_service_name(path: &str, service_name: &str) -> String {
    format!("{path}?serviceName={}", encode(service_name))
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
