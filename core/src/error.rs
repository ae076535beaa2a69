//! Error types for the registry client.
//!
//! # Design
//! Every way a registry call can fail is a variant here, so callers (and
//! tests) can tell a refused connection from a non-200 answer from a body
//! that did not parse. The client logs each failure once before returning
//! it; the legacy shims collapse all of them to `false` / `None`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by `MaxineClient` operations and the `parse_*` mappers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The request never produced a response: connection refused, DNS,
    /// timeout, or the body could not be read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The registry answered with something other than 200. The body is kept
    /// for diagnostics only and is never parsed.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A 200 response whose body was not the expected JSON shape.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// A request payload could not be encoded as JSON.
    #[error("request serialization failed: {0}")]
    Serialization(String),

    /// A legacy `"host:port"` address that does not split into a host and a
    /// numeric port.
    #[error("invalid address {0:?}: expected host:port")]
    InvalidAddress(String),

    /// Register answered 200 without a usable `nodeId`.
    #[error("registry returned no node id")]
    MissingNodeId,

    /// Lifecycle operation attempted before a successful register.
    #[error("node is not registered")]
    NotRegistered,

    /// Register attempted on a lifecycle that was already deregistered.
    #[error("node was deregistered")]
    Deregistered,
}

impl ApiError {
    /// The HTTP status behind this error, if the registry answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when no request reached the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ApiError::Serialization(_)
                | ApiError::InvalidAddress(_)
                | ApiError::NotRegistered
                | ApiError::Deregistered
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_only_for_status_errors() {
        let err = ApiError::Status {
            status: 503,
            body: "down".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(ApiError::Transport("refused".to_string()).status(), None);
    }

    #[test]
    fn display_includes_parser_text() {
        let err = ApiError::Parse("expected value at line 1 column 1".to_string());
        assert_eq!(
            err.to_string(),
            "response parse failed: expected value at line 1 column 1"
        );
    }

    #[test]
    fn local_errors_never_touch_the_network() {
        assert!(ApiError::InvalidAddress("badaddress".to_string()).is_local());
        assert!(ApiError::NotRegistered.is_local());
        assert!(!ApiError::MissingNodeId.is_local());
        assert!(!ApiError::Transport("timeout".to_string()).is_local());
    }
}
