//! Error types shared by entities, entity sets and transports

/// Failure reported by a [`Transport`](crate::transport::Transport) request
///
/// Transport failures are never retried and never roll back local state.
/// They are delivered to subscribers as typed `Error` events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("server responded with status {code}")]
    Status { code: u16 },

    /// The record addressed by the request does not exist
    #[error("{endpoint}{id} not found")]
    NotFound { endpoint: String, id: String },

    /// The request never produced a response
    #[error("network failure: {0}")]
    Network(String),

    /// The response body could not be decoded as flat field maps
    #[error("malformed response: {0}")]
    Decode(String),

    /// The entity was asked to persist without a transport attached
    #[error("entity is not bound to a transport")]
    Unbound,
}
