//! The per-connection client record.

use noxo_protocol::{RoomId, ServerMessage};
use tokio::sync::mpsc;

/// Where a client currently stands in the lobby/room lifecycle.
///
/// ```text
///   Lobby ──(CREATE)──→ Waiting ──(second player)──→ Playing
///     ↑                    │ ▲                          │
///     └──(EXIT / forfeit)──┘ └──(opponent vanishes)─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Connected, not in any room.
    #[default]
    Lobby,
    /// Alone in a room, waiting for an opponent (or for one to return).
    Waiting,
    /// In a room with a game in progress.
    Playing,
}

/// The server's record of one connected peer.
///
/// Created on accept, destroyed when the connection worker exits. The
/// `room` field is a non-owning back-reference: the room registry owns
/// slot identity, and this record merely remembers which room to consult.
#[derive(Debug)]
pub struct Client {
    /// Display name, at most 31 bytes. Empty until the first `JOIN`.
    pub nickname: String,
    /// Lobby/room lifecycle state.
    pub state: ClientState,
    /// The room this client currently occupies, if any.
    pub room: Option<RoomId>,
    /// Cleared when an outbound enqueue fails; the heartbeat reaps
    /// disconnected records.
    pub connected: bool,
    /// Cleared by `QUIT` (and the strike quota) so the worker loop
    /// terminates after the current dispatch.
    pub alive: bool,
    /// Heartbeat probes sent since the last `PONG|`.
    pub missed_pongs: u32,
    /// Malformed inputs seen from this peer.
    pub invalid_count: u32,
    /// 16 lowercase hex characters, generated at accept, opaque to the
    /// client. Only ever compared against a preserved room slot.
    pub session: String,
    /// Feeds the connection's writer task.
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Client {
    pub(crate) fn new(
        session: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            nickname: String::new(),
            state: ClientState::Lobby,
            room: None,
            connected: true,
            alive: true,
            missed_pongs: 0,
            invalid_count: 0,
            session,
            sender,
        }
    }

    /// Queues an outbound message. A failed enqueue (the writer task is
    /// gone) marks the record disconnected; the error never propagates —
    /// the liveness layer removes dead clients.
    pub fn send(&mut self, msg: ServerMessage) {
        if self.sender.send(msg).is_err() {
            self.connected = false;
        }
    }
}
