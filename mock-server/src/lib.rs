//! In-memory Maxine registry speaking the same HTTP endpoints as the real
//! server, for exercising the client end-to-end.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Connections above this count raise a `connections` anomaly.
pub const CONNECTION_THRESHOLD: i64 = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub address: String,
    pub node_name: String,
    pub healthy: bool,
    pub weight: i64,
    pub connections: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub service_name: String,
    pub nodes: Vec<NodeView>,
    pub versions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub service_name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub metadata: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdInput {
    pub node_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverParams {
    pub service_name: Option<String>,
    /// Accepted and ignored; selection is always round-robin.
    pub load_balancing: Option<String>,
    pub version: Option<String>,
    pub tags: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceParams {
    pub service_name: Option<String>,
}

#[derive(Clone, Debug)]
struct Node {
    node_name: String,
    weight: i64,
    connections: i64,
    metadata: Option<Value>,
}

impl Node {
    fn version(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("version")?.as_str()
    }

    fn has_tags(&self, wanted: &[&str]) -> bool {
        let tags: Vec<&str> = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        wanted.iter().all(|tag| tags.contains(tag))
    }

    fn view(&self) -> NodeView {
        NodeView {
            address: self.node_name.clone(),
            node_name: self.node_name.clone(),
            healthy: true,
            weight: self.weight,
            connections: self.connections,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct ServiceEntry {
    nodes: Vec<Node>,
    cursor: usize,
}

impl ServiceEntry {
    fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = Vec::new();
        for version in self.nodes.iter().filter_map(Node::version) {
            if !versions.iter().any(|v| v == version) {
                versions.push(version.to_string());
            }
        }
        versions
    }

    fn view(&self, service_name: &str) -> ServiceView {
        ServiceView {
            service_name: service_name.to_string(),
            nodes: self.nodes.iter().map(Node::view).collect(),
            versions: self.versions(),
        }
    }
}

/// Registry contents: services in name order, nodes in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    services: BTreeMap<String, ServiceEntry>,
    node_index: HashMap<String, String>,
}

impl Registry {
    fn register(&mut self, service_name: &str, host: &str, port: u16, metadata: Option<Value>) -> String {
        let node_name = format!("{host}:{port}");
        let weight = metadata
            .as_ref()
            .and_then(|m| m.get("weight"))
            .and_then(Value::as_i64)
            .unwrap_or(1);
        let entry = self.services.entry(service_name.to_string()).or_default();
        match entry.nodes.iter_mut().find(|n| n.node_name == node_name) {
            Some(existing) => {
                existing.weight = weight;
                existing.metadata = metadata;
            }
            None => entry.nodes.push(Node {
                node_name: node_name.clone(),
                weight,
                connections: 0,
                metadata,
            }),
        }
        self.node_index
            .insert(node_name.clone(), service_name.to_string());
        node_name
    }

    fn contains(&self, node_id: &str) -> bool {
        self.node_index.contains_key(node_id)
    }

    fn deregister(&mut self, node_id: &str) -> bool {
        let Some(service_name) = self.node_index.remove(node_id) else {
            return false;
        };
        if let Some(entry) = self.services.get_mut(&service_name) {
            entry.nodes.retain(|n| n.node_name != node_id);
            if entry.nodes.is_empty() {
                self.services.remove(&service_name);
            } else if entry.cursor >= entry.nodes.len() {
                entry.cursor = 0;
            }
        }
        true
    }

    /// Round-robin over the nodes matching `version` and every tag.
    fn select(&mut self, service_name: &str, version: Option<&str>, tags: &[&str]) -> Option<NodeView> {
        let entry = self.services.get_mut(service_name)?;
        let candidates: Vec<usize> = entry
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| version.map_or(true, |v| n.version() == Some(v)))
            .filter(|(_, n)| n.has_tags(tags))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = candidates[entry.cursor % candidates.len()];
        entry.cursor = (entry.cursor + 1) % candidates.len();
        let node = &mut entry.nodes[index];
        node.connections += 1;
        Some(node.view())
    }

    fn node_count(&self) -> usize {
        self.node_index.len()
    }
}

#[derive(Clone)]
pub struct AppState {
    registry: Arc<RwLock<Registry>>,
    requests: Arc<AtomicU64>,
    api_key: Option<Arc<str>>,
}

pub fn app() -> Router {
    app_with_api_key(None)
}

/// Router that rejects requests lacking `X-API-Key: <api_key>` when a key is
/// set.
pub fn app_with_api_key(api_key: Option<String>) -> Router {
    let state = AppState {
        registry: Arc::new(RwLock::new(Registry::default())),
        requests: Arc::new(AtomicU64::new(0)),
        api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
    };
    Router::new()
        .route("/register", post(register))
        .route("/heartbeat", post(heartbeat))
        .route("/deregister", delete(deregister))
        .route("/discover", get(discover))
        .route("/servers", get(servers))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/maxine/serviceops/services", get(list_services))
        .route("/api/maxine/serviceops/service", get(get_service))
        .route("/api/maxine/serviceops/health-score", get(health_scores))
        .route("/api/maxine/serviceops/anomalies", get(anomalies))
        .route("/api/maxine/serviceops/versions", get(versions))
        .layer(middleware::from_fn_with_state(state.clone(), count_and_authorize))
        .with_state(state)
}

pub async fn run(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

async fn count_and_authorize(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.requests.fetch_add(1, Ordering::Relaxed);
    if let Some(expected) = &state.api_key {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(&**expected) {
            return error(StatusCode::UNAUTHORIZED, "Invalid API key");
        }
    }
    next.run(request).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn register(State(state): State<AppState>, Json(input): Json<RegisterInput>) -> Response {
    let (Some(service_name), Some(host), Some(port)) = (input.service_name, input.host, input.port) else {
        return error(StatusCode::BAD_REQUEST, "Missing serviceName, host or port");
    };
    if service_name.is_empty() || host.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Missing serviceName, host or port");
    }
    let node_id = state
        .registry
        .write()
        .await
        .register(&service_name, &host, port, input.metadata);
    info!(service = %service_name, node_id = %node_id, "registered");
    Json(json!({ "nodeId": node_id, "status": "registered" })).into_response()
}

async fn heartbeat(State(state): State<AppState>, Json(input): Json<NodeIdInput>) -> Response {
    let Some(node_id) = input.node_id else {
        return error(StatusCode::BAD_REQUEST, "Missing nodeId");
    };
    let success = state.registry.read().await.contains(&node_id);
    Json(json!({ "success": success })).into_response()
}

async fn deregister(State(state): State<AppState>, Json(input): Json<NodeIdInput>) -> Response {
    let Some(node_id) = input.node_id else {
        return error(StatusCode::BAD_REQUEST, "Missing nodeId");
    };
    if state.registry.write().await.deregister(&node_id) {
        info!(node_id = %node_id, "deregistered");
    }
    Json(json!({ "success": true })).into_response()
}

async fn discover(State(state): State<AppState>, Query(params): Query<DiscoverParams>) -> Response {
    let Some(service_name) = params.service_name.filter(|s| !s.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "Missing serviceName");
    };
    let tags: Vec<&str> = params
        .tags
        .as_deref()
        .map(|raw| raw.split(',').filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();
    let selected = state
        .registry
        .write()
        .await
        .select(&service_name, params.version.as_deref(), &tags);
    match selected {
        Some(node) => Json(node).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Service unavailable" })),
        )
            .into_response(),
    }
}

async fn servers(State(state): State<AppState>) -> Json<Value> {
    let registry = state.registry.read().await;
    let services: Vec<&String> = registry.services.keys().collect();
    Json(json!({ "services": services }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let registry = state.registry.read().await;
    Json(json!({
        "status": "ok",
        "services": registry.services.len(),
        "nodes": registry.node_count(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let registry = state.registry.read().await;
    Json(json!({
        "requests": state.requests.load(Ordering::Relaxed),
        "services": registry.services.len(),
        "nodes": registry.node_count(),
    }))
}

async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceView>> {
    let registry = state.registry.read().await;
    Json(
        registry
            .services
            .iter()
            .map(|(name, entry)| entry.view(name))
            .collect(),
    )
}

async fn get_service(State(state): State<AppState>, Query(params): Query<ServiceParams>) -> Response {
    let Some(service_name) = params.service_name else {
        return error(StatusCode::BAD_REQUEST, "Missing serviceName");
    };
    let registry = state.registry.read().await;
    match registry.services.get(&service_name) {
        Some(entry) => Json(entry.view(&service_name)).into_response(),
        None => error(StatusCode::NOT_FOUND, "Service not found"),
    }
}

async fn health_scores(State(state): State<AppState>, Query(params): Query<ServiceParams>) -> Response {
    let Some(service_name) = params.service_name else {
        return error(StatusCode::BAD_REQUEST, "Missing serviceName");
    };
    let registry = state.registry.read().await;
    let scores: BTreeMap<&str, f64> = registry
        .services
        .get(&service_name)
        .map(|entry| {
            entry
                .nodes
                .iter()
                .map(|n| (n.node_name.as_str(), (100 - n.connections).max(0) as f64))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "serviceName": service_name, "scores": scores })).into_response()
}

async fn anomalies(State(state): State<AppState>) -> Json<Value> {
    let registry = state.registry.read().await;
    let mut found = Vec::new();
    for (name, entry) in &registry.services {
        if entry.nodes.len() == 1 {
            found.push(json!({
                "serviceName": name,
                "type": "single-node",
                "severity": "low",
            }));
        }
        for node in entry.nodes.iter().filter(|n| n.connections > CONNECTION_THRESHOLD) {
            found.push(json!({
                "serviceName": name,
                "type": "connections",
                "severity": "high",
                "value": node.connections as f64,
                "threshold": CONNECTION_THRESHOLD as f64,
            }));
        }
    }
    Json(json!({ "anomalies": found }))
}

async fn versions(State(state): State<AppState>, Query(params): Query<ServiceParams>) -> Response {
    let Some(service_name) = params.service_name else {
        return error(StatusCode::BAD_REQUEST, "Missing serviceName");
    };
    let registry = state.registry.read().await;
    let versions = registry
        .services
        .get(&service_name)
        .map(ServiceEntry::versions)
        .unwrap_or_default();
    Json(json!({ "serviceName": service_name, "versions": versions })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_derives_node_name_and_weight() {
        let mut registry = Registry::default();
        let id = registry.register("orders", "10.0.0.5", 9000, Some(json!({"weight": 4})));
        assert_eq!(id, "10.0.0.5:9000");
        let view = registry.services["orders"].view("orders");
        assert_eq!(view.nodes[0].weight, 4);
        assert_eq!(view.nodes[0].connections, 0);
    }

    #[test]
    fn reregistering_keeps_a_single_node() {
        let mut registry = Registry::default();
        registry.register("orders", "h", 1, None);
        registry.register("orders", "h", 1, Some(json!({"version": "2"})));
        assert_eq!(registry.node_count(), 1);
        assert_eq!(registry.services["orders"].versions(), vec!["2"]);
    }

    #[test]
    fn select_round_robins_and_counts_connections() {
        let mut registry = Registry::default();
        registry.register("orders", "a", 1, None);
        registry.register("orders", "b", 2, None);
        let first = registry.select("orders", None, &[]).unwrap();
        let second = registry.select("orders", None, &[]).unwrap();
        let third = registry.select("orders", None, &[]).unwrap();
        assert_eq!(first.node_name, "a:1");
        assert_eq!(second.node_name, "b:2");
        assert_eq!(third.node_name, "a:1");
        assert_eq!(third.connections, 2);
    }

    #[test]
    fn select_filters_by_version_and_tags() {
        let mut registry = Registry::default();
        registry.register("orders", "a", 1, Some(json!({"version": "1", "tags": ["eu"]})));
        registry.register("orders", "b", 2, Some(json!({"version": "2", "tags": ["eu", "canary"]})));
        assert_eq!(registry.select("orders", Some("2"), &[]).unwrap().node_name, "b:2");
        assert_eq!(registry.select("orders", None, &["canary"]).unwrap().node_name, "b:2");
        assert!(registry.select("orders", Some("1"), &["canary"]).is_none());
        assert!(registry.select("billing", None, &[]).is_none());
    }

    #[test]
    fn deregister_drops_empty_services() {
        let mut registry = Registry::default();
        registry.register("orders", "a", 1, None);
        assert!(registry.deregister("a:1"));
        assert!(!registry.deregister("a:1"));
        assert!(registry.services.is_empty());
        assert!(!registry.contains("a:1"));
    }

    #[test]
    fn versions_are_distinct_in_first_seen_order() {
        let mut registry = Registry::default();
        registry.register("orders", "a", 1, Some(json!({"version": "2.0"})));
        registry.register("orders", "b", 2, Some(json!({"version": "1.0"})));
        registry.register("orders", "c", 3, Some(json!({"version": "2.0"})));
        assert_eq!(registry.services["orders"].versions(), vec!["2.0", "1.0"]);
    }

    #[test]
    fn register_input_fields_are_optional() {
        let input: RegisterInput = serde_json::from_str(r#"{"serviceName":"orders"}"#).unwrap();
        assert_eq!(input.service_name.as_deref(), Some("orders"));
        assert!(input.host.is_none());
        assert!(input.port.is_none());
        assert!(input.metadata.is_none());
    }
}
