//! Error types for the room layer.

use noxo_game::MoveError;
use noxo_protocol::{ClientId, RoomId};

/// Errors from room operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    /// The room table already holds `max_rooms` rooms.
    #[error("lobby is full")]
    LobbyFull,

    /// No room with the given id exists.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The client tried to join a room it already occupies.
    #[error("cannot join own room")]
    SelfJoin,

    /// Both slots of the room hold live clients.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The client does not occupy a slot in this room.
    #[error("client {0} not in room {1}")]
    NotInRoom(ClientId, RoomId),

    /// No preserved slot carries the given name.
    #[error("no reconnect slot for `{0}`")]
    NoReconnectSlot(String),

    /// A preserved slot carries the name but a different session token.
    #[error("session mismatch for `{0}`")]
    InvalidSession(String),

    /// The game engine rejected the move.
    #[error(transparent)]
    Move(#[from] MoveError),
}
