//! Error types for the session layer.

use noxo_protocol::ClientId;

/// Errors from client-table operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The live client count already equals `max_clients`.
    #[error("server is full")]
    ServerFull,

    /// No record exists for the given client.
    #[error("no client record for {0}")]
    NotFound(ClientId),
}
