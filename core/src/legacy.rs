//! Compatibility shim for the older address-based API.
//!
//! Everything here calls the public `MaxineClient` primitives and collapses
//! their errors into `false` / `None`; the underlying failure has already
//! been logged by the client.

use tracing::warn;

use crate::client::MaxineClient;
use crate::error::{ApiError, Result};
use crate::transport::Transport;
use crate::types::{DiscoverQuery, NodeId, Registration, ServiceNode};

impl<T: Transport> MaxineClient<T> {
    /// Discover with no load-balancing, version or tag filter.
    pub fn discover(&self, service_name: &str) -> Option<ServiceNode> {
        self.discover_lightning(&DiscoverQuery::new(service_name)).ok()
    }

    /// Register from a `"host:port"` address. Returns `false` without any
    /// network call when the address does not split cleanly.
    ///
    /// `node_name` is not sent; the registry derives the node name from the
    /// address.
    pub fn register_service(&self, service_name: &str, node_name: &str, address: &str) -> bool {
        let (host, port) = match split_address(address) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(service = service_name, node = node_name, error = %err, "register_service rejected");
                return false;
            }
        };
        self.register_lightning(&Registration::new(service_name, host, port))
            .is_ok()
    }

    /// Deregister the node id `"<service_name>:<node_name>"`.
    pub fn deregister_service(&self, service_name: &str, node_name: &str) -> bool {
        let node_id = NodeId::new(format!("{service_name}:{node_name}"));
        self.deregister_lightning(&node_id).is_ok()
    }
}

/// Split `"host:port"` into its parts. Exactly one `:` and a port that fits
/// `u16` are required; the host must not be empty.
pub fn split_address(address: &str) -> Result<(&str, u16)> {
    let invalid = || ApiError::InvalidAddress(address.to_string());
    let (host, port) = address.split_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host, port))
}
