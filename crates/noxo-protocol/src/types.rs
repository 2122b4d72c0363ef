//! Core protocol types: participant ids and the message catalogue.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected client.
///
/// Newtype over `u64` so a `ClientId` can never be confused with a
/// [`RoomId`] even though both are plain integers underneath. Ids are
/// process-local and never appear on the wire — clients are addressed by
/// nickname in broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// A unique identifier for a room. Monotonically increasing, assigned by
/// the room registry, and visible to clients in `CREATED`/`ROOMS` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Name handling
// ---------------------------------------------------------------------------

/// Upper bound, in bytes, for nicknames and room names.
pub const MAX_NAME_BYTES: usize = 31;

/// Truncates a name to at most [`MAX_NAME_BYTES`] bytes without splitting
/// a UTF-8 character.
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_BYTES {
        return name.to_string();
    }
    let mut end = MAX_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

// ---------------------------------------------------------------------------
// Room listing
// ---------------------------------------------------------------------------

/// One room's entry in a `ROOMS` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    /// The room's unique id.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// `true` when a game is in progress, `false` while waiting.
    pub playing: bool,
    /// Number of live occupants (0–2).
    pub occupied: u8,
}

// ---------------------------------------------------------------------------
// ClientCommand — inbound
// ---------------------------------------------------------------------------

/// A parsed client → server command.
///
/// The TAG table is a closed set: anything else on the wire is rejected
/// at parse time with [`ProtocolError::UnknownCommand`](crate::ProtocolError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `JOIN|name` — pick (or replace) a nickname, enter the lobby.
    Join { name: String },
    /// `RECONNECT|name|session` — claim a preserved slot after a drop.
    Reconnect { name: String, session: String },
    /// `CREATE|name` — open a new room and occupy its first slot.
    Create { name: String },
    /// `JOINROOM|id` — take the free slot of an existing room.
    JoinRoom { id: RoomId },
    /// `EXIT|` — voluntarily leave the current room.
    Exit,
    /// `LIST|` — request the room listing.
    List,
    /// `MOVE|x|y` — place a mark at column `x`, row `y`.
    Move { x: u8, y: u8 },
    /// `REPLAY|YES` / `REPLAY|NO` — vote on another round.
    Replay { accept: bool },
    /// `QUIT|` — close the session cleanly.
    Quit,
    /// `PING|` — client-side liveness probe; answered with `PONG|`.
    Ping,
    /// `PONG|` — answer to a server `PING|`.
    Pong,
}

// ---------------------------------------------------------------------------
// ServerMessage — outbound
// ---------------------------------------------------------------------------

/// A server → client message, one wire line each.
///
/// See [`codec::encode`](crate::encode) for the exact line produced by
/// every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent immediately after accept.
    Hello,
    /// Nickname accepted.
    Joined(String),
    /// The session token for later `RECONNECT`.
    Session(String),
    /// A preserved slot was successfully reclaimed.
    Reconnected,
    /// Room created; the creator occupies p1.
    Created { id: RoomId, name: String },
    /// Join acknowledged; the round-start burst follows.
    JoinedRoom { id: RoomId, name: String },
    /// The client has left its room.
    Exited,
    /// Room listing snapshot, rooms in id order.
    Rooms(Vec<RoomSummary>),
    /// Round start: names the opponent.
    Start { opponent: String },
    /// The mark the recipient plays this round.
    Symbol(char),
    /// Clear the board display.
    Clear,
    /// Both players agreed to a replay; a fresh round begins.
    Restart,
    /// The recipient is on move.
    Turn,
    /// Bare turn marker used during a reconnect board replay.
    TurnReplay,
    /// A mark was placed; also used to replay the board on reconnect.
    Move { mover: String, x: u8, y: u8 },
    /// The recipient won the round (or was awarded a forfeit).
    Win,
    /// The recipient lost; carries the winner's name.
    Lose { winner: String },
    /// The round ended with a full board and no line.
    Draw,
    /// Informational event, never an error.
    Info(String),
    /// One of the error texts of the server's error taxonomy.
    Error(String),
    /// Acknowledges `QUIT|`.
    Bye,
    /// Heartbeat probe; the client must answer with `PONG|`.
    Ping,
    /// Answer to a client `PING|`.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_name_short_names_unchanged() {
        assert_eq!(truncate_name("alice"), "alice");
        assert_eq!(truncate_name(""), "");
    }

    #[test]
    fn test_truncate_name_caps_at_31_bytes() {
        let long = "a".repeat(64);
        assert_eq!(truncate_name(&long).len(), MAX_NAME_BYTES);
    }

    #[test]
    fn test_truncate_name_respects_char_boundaries() {
        // 16 two-byte characters = 32 bytes; the cut must land between
        // characters, not inside one.
        let name = "é".repeat(16);
        let truncated = truncate_name(&name);
        assert!(truncated.len() <= MAX_NAME_BYTES);
        assert_eq!(truncated, "é".repeat(15));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ClientId(4).to_string(), "C-4");
        assert_eq!(RoomId(9).to_string(), "R-9");
    }
}
