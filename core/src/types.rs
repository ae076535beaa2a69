//! Data model shared by the request builder and the response mapper.
//!
//! # Design
//! Every value here is a snapshot of one registry response (or one caller
//! input) and holds no reference back to the client. Fields the registry may
//! omit are `Option`, so "not provided" never collapses into `0` or `false`.
//! Required strings and flags default to `""` / `false` when missing.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One registered instance of a service, as returned by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNode {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub healthy: bool,
    #[serde(default, deserialize_with = "truncated_int", skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, deserialize_with = "truncated_int", skip_serializing_if = "Option::is_none")]
    pub connections: Option<i64>,
    /// Arbitrary document attached at registration. A JSON `null` reads as
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Reads any JSON number as an integer, truncating fractions toward zero.
/// Non-numeric values are still rejected.
fn truncated_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))))
}

/// A service with all of its nodes and the versions they advertise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub nodes: Vec<ServiceNode>,
    #[serde(default)]
    pub versions: Vec<String>,
}

/// Health score of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub node_id: String,
    pub score: f64,
}

/// An anomaly reported by the registry. `value` and `threshold` are absent
/// for anomaly types without a numeric detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(default)]
    pub service_name: String,
    #[serde(rename = "type", default)]
    pub anomaly_type: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Opaque registration token issued by the registry.
///
/// Only ever passed back to heartbeat and deregister; the client never looks
/// inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discovery filters. Empty strings and an empty tag list mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverQuery {
    pub service_name: String,
    pub load_balancing: String,
    pub version: String,
    pub tags: Vec<String>,
}

impl DiscoverQuery {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    pub fn with_load_balancing(mut self, strategy: impl Into<String>) -> Self {
        self.load_balancing = strategy.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Input for registering one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub metadata: Option<Value>,
}

impl Registration {
    pub fn new(service_name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            host: host.into(),
            port,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
