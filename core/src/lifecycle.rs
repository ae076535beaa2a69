//! Registration lifecycle of a single node.
//!
//! ```text
//! Unregistered --register--> Registered(id) --deregister--> Deregistered(id)
//!                              |      ^
//!                              +------+ heartbeat
//! ```
//!
//! Nothing here schedules heartbeats or retries: the caller owns the timing
//! loop and decides what to do when a heartbeat is not acknowledged.

use tracing::info;

use crate::client::MaxineClient;
use crate::error::{ApiError, Result};
use crate::transport::Transport;
use crate::types::{NodeId, Registration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Unregistered,
    Registered(NodeId),
    /// Terminal. The stale id is kept so callers can still see what was
    /// deregistered.
    Deregistered(NodeId),
}

/// Tracks the registry-issued id of one instance across its lifetime.
///
/// The lifecycle borrows the client for every call and never owns it.
#[derive(Debug, Clone)]
pub struct NodeLifecycle {
    registration: Registration,
    state: NodeState,
}

impl NodeLifecycle {
    pub fn new(registration: Registration) -> Self {
        Self {
            registration,
            state: NodeState::Unregistered,
        }
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn node_id(&self) -> Option<&NodeId> {
        match &self.state {
            NodeState::Unregistered => None,
            NodeState::Registered(id) | NodeState::Deregistered(id) => Some(id),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.state, NodeState::Registered(_))
    }

    /// Register (or re-register) the node. On failure the previous state is
    /// kept.
    pub fn register<T: Transport>(&mut self, client: &MaxineClient<T>) -> Result<NodeId> {
        if matches!(self.state, NodeState::Deregistered(_)) {
            return Err(ApiError::Deregistered);
        }
        let id = client.register_lightning(&self.registration)?;
        info!(
            service = %self.registration.service_name,
            node_id = %id,
            "node registered"
        );
        self.state = NodeState::Registered(id.clone());
        Ok(id)
    }

    /// Send one heartbeat. `Ok(false)` leaves the node's liveness on the
    /// registry unknown; the state is not changed either way.
    ///
    /// A deregistered node still sends its stale id and lets the registry
    /// reject it.
    pub fn heartbeat<T: Transport>(&self, client: &MaxineClient<T>) -> Result<bool> {
        let id = self.node_id().ok_or(ApiError::NotRegistered)?;
        client.heartbeat_lightning(id)
    }

    /// Deregister the node. The state only moves to `Deregistered` once the
    /// registry confirms, so a failed call can be repeated.
    pub fn deregister<T: Transport>(&mut self, client: &MaxineClient<T>) -> Result<()> {
        let id = self.node_id().cloned().ok_or(ApiError::NotRegistered)?;
        client.deregister_lightning(&id)?;
        info!(
            service = %self.registration.service_name,
            node_id = %id,
            "node deregistered"
        );
        self.state = NodeState::Deregistered(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::scripted::ScriptedTransport;

    fn lifecycle() -> NodeLifecycle {
        NodeLifecycle::new(Registration::new("orders", "10.0.0.5", 9000))
    }

    fn client(transport: &ScriptedTransport) -> MaxineClient<&ScriptedTransport> {
        MaxineClient::with_transport(&ClientConfig::new("http://registry:8080"), transport)
    }

    #[test]
    fn starts_unregistered() {
        let node = lifecycle();
        assert_eq!(node.state(), &NodeState::Unregistered);
        assert!(node.node_id().is_none());
    }

    #[test]
    fn full_lifecycle() {
        let transport = ScriptedTransport::new()
            .reply(200, r#"{"nodeId":"10.0.0.5:9000"}"#)
            .reply(200, r#"{"success":true}"#)
            .reply(200, r#"{"success":true}"#);
        let client = client(&transport);
        let mut node = lifecycle();

        assert_eq!(node.register(&client).unwrap().as_str(), "10.0.0.5:9000");
        assert!(node.is_registered());
        assert!(node.heartbeat(&client).unwrap());
        node.deregister(&client).unwrap();
        assert_eq!(
            node.state(),
            &NodeState::Deregistered(NodeId::new("10.0.0.5:9000"))
        );
    }

    #[test]
    fn failed_register_stays_unregistered() {
        let transport = ScriptedTransport::new().reply(500, "boom");
        let client = client(&transport);
        let mut node = lifecycle();
        assert!(node.register(&client).is_err());
        assert_eq!(node.state(), &NodeState::Unregistered);
    }

    #[test]
    fn missing_node_id_stays_unregistered() {
        let transport = ScriptedTransport::new().reply(200, r#"{"status":"registered"}"#);
        let client = client(&transport);
        let mut node = lifecycle();
        assert_eq!(node.register(&client).unwrap_err(), ApiError::MissingNodeId);
        assert!(!node.is_registered());
    }

    #[test]
    fn calls_before_register_are_local_errors() {
        let transport = ScriptedTransport::new();
        let client = client(&transport);
        let mut node = lifecycle();
        assert_eq!(node.heartbeat(&client).unwrap_err(), ApiError::NotRegistered);
        assert_eq!(node.deregister(&client).unwrap_err(), ApiError::NotRegistered);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn unacknowledged_heartbeat_keeps_state() {
        let transport = ScriptedTransport::new()
            .reply(200, r#"{"nodeId":"n"}"#)
            .reply(200, r#"{"success":false}"#)
            .fail("timeout");
        let client = client(&transport);
        let mut node = lifecycle();
        node.register(&client).unwrap();
        assert!(!node.heartbeat(&client).unwrap());
        assert!(node.heartbeat(&client).is_err());
        assert!(node.is_registered());
    }

    #[test]
    fn failed_deregister_can_be_repeated() {
        let transport = ScriptedTransport::new()
            .reply(200, r#"{"nodeId":"n"}"#)
            .fail("connection reset")
            .reply(200, r#"{"success":true}"#);
        let client = client(&transport);
        let mut node = lifecycle();
        node.register(&client).unwrap();
        assert!(node.deregister(&client).is_err());
        assert!(node.is_registered());
        node.deregister(&client).unwrap();
        assert!(matches!(node.state(), NodeState::Deregistered(_)));
    }

    #[test]
    fn deregistered_is_terminal_but_stale_heartbeats_are_sent() {
        let transport = ScriptedTransport::new()
            .reply(200, r#"{"nodeId":"n"}"#)
            .reply(200, r#"{"success":true}"#)
            .reply(200, r#"{"success":false}"#);
        let client = client(&transport);
        let mut node = lifecycle();
        node.register(&client).unwrap();
        node.deregister(&client).unwrap();

        assert!(!node.heartbeat(&client).unwrap());
        assert_eq!(transport.sent_count(), 3);
        assert_eq!(node.register(&client).unwrap_err(), ApiError::Deregistered);
        assert_eq!(transport.sent_count(), 3);
    }
}
