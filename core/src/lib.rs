//! Synchronous client for the Maxine service-discovery registry.
//!
//! # Overview
//! Registers instances, keeps them alive with heartbeats, deregisters them,
//! and discovers healthy nodes of a service over the registry's HTTP/JSON
//! API. Each operation is exactly one blocking round-trip.
//!
//! # Design
//! - `RequestBuilder` turns typed inputs into plain-data `HttpRequest`s.
//! - A `Transport` executes them; `UreqTransport` is the default.
//! - `response::parse_*` maps each `HttpResponse` into the data model,
//!   defaulting required fields and keeping optional ones as `Option`.
//! - `MaxineClient` wires the three together and logs every failure before
//!   returning it as an `ApiError`.
//! - `NodeLifecycle` tracks one node's registration id; heartbeat timing is
//!   left to the caller.
//!
//! ```no_run
//! use maxine_client::{ClientConfig, DiscoverQuery, MaxineClient, NodeLifecycle, Registration};
//!
//! let client = MaxineClient::new(ClientConfig::from_env());
//! let mut node = NodeLifecycle::new(Registration::new("orders", "10.0.0.5", 9000));
//! node.register(&client)?;
//! node.heartbeat(&client)?;
//!
//! let peer = client.discover_lightning(&DiscoverQuery::new("billing").with_version("2.0"))?;
//! println!("billing at {}", peer.address);
//!
//! node.deregister(&client)?;
//! # Ok::<(), maxine_client::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod legacy;
pub mod lifecycle;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

pub use client::MaxineClient;
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use lifecycle::{NodeLifecycle, NodeState};
pub use request::RequestBuilder;
pub use transport::{Transport, UreqTransport};
pub use types::{
    Anomaly, DiscoverQuery, HealthScore, NodeId, Registration, Service, ServiceNode,
};
