//! Response mapper: raw `HttpResponse` in, data-model values out.
//!
//! Rules applied to every endpoint:
//! 1. Anything but 200 is `ApiError::Status`; the body is not inspected.
//! 2. A 200 whose body is not the expected JSON shape is `ApiError::Parse`.
//! 3. Missing required strings and flags default to `""` / `false`; missing
//!    optional numbers and documents stay `None`.
//! 4. Arrays keep the server's order. Health scores come from an unordered
//!    mapping and are returned sorted by node id.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::HttpResponse;
use crate::types::{Anomaly, HealthScore, NodeId, Service, ServiceNode};

/// The only status the registry uses for success.
pub const SUCCESS_STATUS: u16 = 200;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterReply {
    #[serde(default)]
    node_id: String,
}

#[derive(Deserialize)]
struct HeartbeatReply {
    #[serde(default)]
    success: bool,
}

#[derive(Deserialize)]
struct ServersReply {
    #[serde(default)]
    services: Vec<String>,
}

#[derive(Deserialize)]
struct HealthScoresReply {
    #[serde(default)]
    scores: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct AnomaliesReply {
    #[serde(default)]
    anomalies: Vec<Anomaly>,
}

#[derive(Deserialize)]
struct VersionsReply {
    #[serde(default)]
    versions: Vec<String>,
}

pub fn parse_discover(response: HttpResponse) -> Result<ServiceNode> {
    decode(response)
}

/// An empty or missing `nodeId` is `ApiError::MissingNodeId`.
pub fn parse_register(response: HttpResponse) -> Result<NodeId> {
    let reply: RegisterReply = decode(response)?;
    if reply.node_id.is_empty() {
        return Err(ApiError::MissingNodeId);
    }
    Ok(NodeId::new(reply.node_id))
}

pub fn parse_heartbeat(response: HttpResponse) -> Result<bool> {
    let reply: HeartbeatReply = decode(response)?;
    Ok(reply.success)
}

/// Only the status matters; whatever body came back is ignored.
pub fn parse_deregister(response: HttpResponse) -> Result<()> {
    check_status(&response)
}

pub fn parse_servers(response: HttpResponse) -> Result<Vec<String>> {
    let reply: ServersReply = decode(response)?;
    Ok(reply.services)
}

/// Health and metrics documents are passed through untouched.
pub fn parse_document(response: HttpResponse) -> Result<Value> {
    decode(response)
}

pub fn parse_services(response: HttpResponse) -> Result<Vec<Service>> {
    decode(response)
}

pub fn parse_service(response: HttpResponse) -> Result<Service> {
    decode(response)
}

pub fn parse_health_scores(response: HttpResponse) -> Result<Vec<HealthScore>> {
    let reply: HealthScoresReply = decode(response)?;
    Ok(reply
        .scores
        .into_iter()
        .map(|(node_id, score)| HealthScore { node_id, score })
        .collect())
}

pub fn parse_anomalies(response: HttpResponse) -> Result<Vec<Anomaly>> {
    let reply: AnomaliesReply = decode(response)?;
    Ok(reply.anomalies)
}

pub fn parse_versions(response: HttpResponse) -> Result<Vec<String>> {
    let reply: VersionsReply = decode(response)?;
    Ok(reply.versions)
}

fn check_status(response: &HttpResponse) -> Result<()> {
    if response.status == SUCCESS_STATUS {
        return Ok(());
    }
    Err(ApiError::Status {
        status: response.status,
        body: response.body.clone(),
    })
}

fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| {
        debug!(body = %response.body, "unparsable registry response");
        ApiError::Parse(e.to_string())
    })
}
