//! Unified error type for the noxo server.

use noxo_protocol::ProtocolError;
use noxo_room::RoomError;
use noxo_session::SessionError;
use noxo_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attributes let `?` convert layer errors automatically,
/// so binaries and tests deal with one error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (framing, parsing).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (client table).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (room table, game rules).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Startup configuration was unusable (e.g. a non-numeric CLI port).
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use noxo_protocol::RoomId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(std::io::Error::other("gone"));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Transport(_)));
        assert!(server_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::MissingPrefix;
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::ServerFull;
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(RoomId(1));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Room(_)));
    }
}
