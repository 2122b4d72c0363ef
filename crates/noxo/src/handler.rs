//! Per-connection worker: greeting, read loop, TAG dispatch, teardown.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task draining the client's
//! outbound queue to the socket. The worker never holds a registry lock
//! across a blocking read; handlers take the client lock first, then the
//! room lock, mutate, and deliver the produced outbox before releasing —
//! which keeps broadcast order atomic with the state change.

use std::sync::Arc;
use std::time::Duration;

use noxo_game::MoveError;
use noxo_protocol::{
    encode, parse, truncate_name, ClientCommand, ClientId, ProtocolError,
    ServerMessage,
};
use noxo_room::{RoomError, RoomRegistry};
use noxo_session::{ClientRegistry, ClientState};
use noxo_transport::{ConnectionId, LineConnection, LineWriter};
use tokio::sync::mpsc;

use crate::server::ServerState;

/// Total read silence after which a worker gives up on its peer. Well
/// past the point where the heartbeat has already declared the client
/// dead, so this only reaps workers whose record is gone.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the read loop keeps going after a dispatch.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: LineConnection,
    state: Arc<ServerState>,
) {
    let conn_id = conn.id();
    let (mut reader, mut writer) = conn.into_split();
    let (tx, rx) = mpsc::unbounded_channel();

    let client_id = {
        let mut clients = state.clients.lock().await;
        match clients.register(tx) {
            Ok(id) => id,
            Err(err) => {
                drop(clients);
                tracing::info!(%conn_id, %err, "rejecting connection");
                let full = ServerMessage::Error("Server full".to_string());
                let _ = writer.write_line(&encode(&full)).await;
                return;
            }
        }
    };
    spawn_writer(writer, rx, conn_id);

    {
        let mut clients = state.clients.lock().await;
        clients.send(client_id, ServerMessage::Hello);
    }

    loop {
        let line = match tokio::time::timeout(IDLE_TIMEOUT, reader.read_line())
            .await
        {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                tracing::debug!(%client_id, "connection closed by peer");
                break;
            }
            Ok(Err(err)) => {
                tracing::debug!(%client_id, %err, "read failed");
                break;
            }
            Err(_) => {
                tracing::debug!(%client_id, "idle timeout");
                break;
            }
        };

        match dispatch(&state, client_id, &line).await {
            Flow::Continue => {}
            Flow::Close => break,
        }
    }

    teardown(&state, client_id).await;
}

/// Drains the outbound queue to the socket. Exits when the queue closes
/// (client record removed) or a write fails; dropping the write half
/// then half-closes the socket, after all queued lines were flushed.
fn spawn_writer(
    mut writer: LineWriter,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    conn_id: ConnectionId,
) {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(err) = writer.write_line(&encode(&msg)).await {
                tracing::debug!(%conn_id, %err, "outbound write failed");
                break;
            }
        }
    });
}

/// Worker exit path: an unannounced vacancy preserves the room slot for
/// reconnect, then the client record is destroyed.
async fn teardown(state: &Arc<ServerState>, client_id: ClientId) {
    let mut clients = state.clients.lock().await;
    if let Some(room_id) = clients.get(client_id).and_then(|c| c.room) {
        let mut rooms = state.rooms.lock().await;
        match rooms.handle_disconnect(
            room_id,
            client_id,
            state.config.disconnect_grace,
        ) {
            Ok(outcome) => {
                if let Some(remaining) = outcome.remaining {
                    set_state(&mut clients, remaining, ClientState::Waiting);
                }
                deliver(&mut clients, outcome.outbox);
            }
            Err(err) => {
                tracing::debug!(%client_id, %err, "stale room back-reference at teardown");
            }
        }
    }
    clients.remove(client_id);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

async fn dispatch(
    state: &Arc<ServerState>,
    id: ClientId,
    line: &str,
) -> Flow {
    let cmd = match parse(line) {
        Ok(cmd) => cmd,
        Err(err) => return invalid_input(state, id, &err).await,
    };

    match cmd {
        ClientCommand::Join { name } => {
            let mut clients = state.clients.lock().await;
            if let Some(client) = clients.get_mut(id) {
                client.nickname = truncate_name(&name);
                if client.room.is_none() {
                    client.state = ClientState::Lobby;
                }
                let nick = client.nickname.clone();
                let token = client.session.clone();
                client.send(ServerMessage::Joined(nick));
                client.send(ServerMessage::Session(token));
            }
            Flow::Continue
        }

        ClientCommand::Reconnect { name, session } => {
            let mut clients = state.clients.lock().await;
            let mut rooms = state.rooms.lock().await;
            if clients.get(id).is_some_and(|c| c.room.is_some()) {
                // Already seated somewhere; nothing to reclaim.
                clients.send(
                    id,
                    ServerMessage::Error("No reconnect slot".to_string()),
                );
                return Flow::Continue;
            }
            match rooms.reconnect(id, &name, &session) {
                Ok(outcome) => {
                    if let Some(client) = clients.get_mut(id) {
                        client.nickname = name;
                        client.room = Some(outcome.room_id);
                        client.state = if outcome.playing {
                            ClientState::Playing
                        } else {
                            ClientState::Waiting
                        };
                    }
                    if let Some(opponent) = outcome.opponent {
                        set_state(&mut clients, opponent, ClientState::Playing);
                    }
                    deliver(&mut clients, outcome.outbox);
                }
                Err(RoomError::InvalidSession(_)) => clients.send(
                    id,
                    ServerMessage::Error("Invalid session".to_string()),
                ),
                Err(_) => clients.send(
                    id,
                    ServerMessage::Error("No reconnect slot".to_string()),
                ),
            }
            Flow::Continue
        }

        ClientCommand::Create { name } => {
            let mut clients = state.clients.lock().await;
            let mut rooms = state.rooms.lock().await;
            leave_current_room(&mut clients, &mut rooms, id);
            let Some((nick, token)) = credentials(&clients, id) else {
                return Flow::Continue;
            };
            match rooms.create(&name, id, &nick, &token) {
                Ok((room_id, outbox)) => {
                    if let Some(client) = clients.get_mut(id) {
                        client.room = Some(room_id);
                        client.state = ClientState::Waiting;
                    }
                    deliver(&mut clients, outbox);
                }
                Err(RoomError::LobbyFull) => clients.send(
                    id,
                    ServerMessage::Error("Lobby full".to_string()),
                ),
                Err(err) => {
                    tracing::debug!(%id, %err, "create failed");
                }
            }
            Flow::Continue
        }

        ClientCommand::JoinRoom { id: room_id } => {
            let mut clients = state.clients.lock().await;
            let mut rooms = state.rooms.lock().await;
            if clients.get(id).and_then(|c| c.room) == Some(room_id) {
                clients.send(
                    id,
                    ServerMessage::Error(
                        "Cannot join your own room".to_string(),
                    ),
                );
                return Flow::Continue;
            }
            leave_current_room(&mut clients, &mut rooms, id);
            let Some((nick, token)) = credentials(&clients, id) else {
                return Flow::Continue;
            };
            match rooms.join(room_id, id, &nick, &token) {
                Ok(outcome) => {
                    if let Some(client) = clients.get_mut(id) {
                        client.room = Some(room_id);
                        client.state = ClientState::Playing;
                    }
                    set_state(
                        &mut clients,
                        outcome.incumbent,
                        ClientState::Playing,
                    );
                    deliver(&mut clients, outcome.outbox);
                }
                Err(err) => {
                    let text = match err {
                        RoomError::NotFound(_) => "No such room",
                        RoomError::SelfJoin => "Cannot join your own room",
                        RoomError::RoomFull(_) => "Room full",
                        other => {
                            tracing::debug!(%id, err = %other, "join failed");
                            return Flow::Continue;
                        }
                    };
                    clients.send(id, ServerMessage::Error(text.to_string()));
                }
            }
            Flow::Continue
        }

        ClientCommand::Exit => {
            let mut clients = state.clients.lock().await;
            let mut rooms = state.rooms.lock().await;
            // A no-op outside a room.
            leave_current_room(&mut clients, &mut rooms, id);
            Flow::Continue
        }

        ClientCommand::List => {
            let mut clients = state.clients.lock().await;
            let rooms = state.rooms.lock().await;
            let listing = rooms.list();
            clients.send(id, ServerMessage::Rooms(listing));
            Flow::Continue
        }

        ClientCommand::Move { x, y } => handle_move(state, id, x, y).await,

        ClientCommand::Replay { accept } => {
            handle_replay(state, id, accept).await
        }

        ClientCommand::Quit => {
            let mut clients = state.clients.lock().await;
            clients.send(id, ServerMessage::Bye);
            if let Some(client) = clients.get_mut(id) {
                client.alive = false;
            }
            Flow::Close
        }

        ClientCommand::Ping => {
            let mut clients = state.clients.lock().await;
            clients.send(id, ServerMessage::Pong);
            Flow::Continue
        }

        ClientCommand::Pong => {
            let mut clients = state.clients.lock().await;
            if let Some(client) = clients.get_mut(id) {
                client.missed_pongs = 0;
            }
            Flow::Continue
        }
    }
}

async fn handle_move(
    state: &Arc<ServerState>,
    id: ClientId,
    x: u8,
    y: u8,
) -> Flow {
    let mut clients = state.clients.lock().await;
    let mut rooms = state.rooms.lock().await;
    let Some(room_id) = clients.get(id).and_then(|c| c.room) else {
        clients.send(
            id,
            ServerMessage::Error("Not in game room".to_string()),
        );
        return Flow::Continue;
    };
    match rooms.play(room_id, id, x, y) {
        Ok(outbox) => {
            deliver(&mut clients, outbox);
            Flow::Continue
        }
        Err(err) => {
            let text = match err {
                RoomError::Move(MoveError::GameFinished) => "Game finished",
                RoomError::Move(MoveError::NotYourTurn) => "Not your turn",
                RoomError::Move(MoveError::Occupied) => "Cell occupied",
                RoomError::Move(MoveError::OutOfRange) => {
                    // Out-of-range coordinates are protocol abuse, like a
                    // malformed MOVE line.
                    clients.send(
                        id,
                        ServerMessage::Error(
                            "Invalid MOVE format".to_string(),
                        ),
                    );
                    return apply_strike(&mut clients, id);
                }
                other => {
                    tracing::debug!(%id, err = %other, "move failed");
                    "Not in game room"
                }
            };
            clients.send(id, ServerMessage::Error(text.to_string()));
            Flow::Continue
        }
    }
}

async fn handle_replay(
    state: &Arc<ServerState>,
    id: ClientId,
    accept: bool,
) -> Flow {
    let mut clients = state.clients.lock().await;
    let mut rooms = state.rooms.lock().await;
    let Some(room_id) = clients.get(id).and_then(|c| c.room) else {
        clients.send(id, ServerMessage::Error("Not in room".to_string()));
        return Flow::Continue;
    };
    if accept {
        match rooms.vote_replay(room_id, id) {
            Ok(outbox) => deliver(&mut clients, outbox),
            Err(err) => {
                tracing::debug!(%id, %err, "replay vote failed");
                clients.send(
                    id,
                    ServerMessage::Error("Not in room".to_string()),
                );
            }
        }
    } else {
        match rooms.decline_replay(room_id, id) {
            Ok(outcome) => {
                if let Some(client) = clients.get_mut(id) {
                    client.room = None;
                    client.state = ClientState::Lobby;
                }
                if let Some(remaining) = outcome.remaining {
                    set_state(&mut clients, remaining, ClientState::Waiting);
                }
                deliver(&mut clients, outcome.outbox);
            }
            Err(err) => {
                tracing::debug!(%id, %err, "replay decline failed");
                clients.send(
                    id,
                    ServerMessage::Error("Not in room".to_string()),
                );
            }
        }
    }
    Flow::Continue
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Maps a parse failure to its `ERROR` reply and applies the strike.
async fn invalid_input(
    state: &Arc<ServerState>,
    id: ClientId,
    err: &ProtocolError,
) -> Flow {
    let mut clients = state.clients.lock().await;
    let text = match err {
        ProtocolError::BadMove => "Invalid MOVE format",
        ProtocolError::BadReconnect => "Invalid reconnect format",
        ProtocolError::BadRoomId => {
            // An unknown-room answer, not protocol abuse: no strike.
            clients.send(
                id,
                ServerMessage::Error("No such room".to_string()),
            );
            return Flow::Continue;
        }
        _ => "UNKNOWN_CMD",
    };
    clients.send(id, ServerMessage::Error(text.to_string()));
    apply_strike(&mut clients, id)
}

/// Adds a strike; at the quota the session is told off and closed. The
/// room slot stays reconnect-eligible — the teardown path treats the
/// forced close like any unannounced disconnect.
fn apply_strike(clients: &mut ClientRegistry, id: ClientId) -> Flow {
    if clients.strike(id) {
        tracing::info!(client_id = %id, "invalid-input quota reached, closing");
        clients.send(
            id,
            ServerMessage::Error("Too many invalid messages".to_string()),
        );
        if let Some(client) = clients.get_mut(id) {
            client.alive = false;
        }
        Flow::Close
    } else {
        Flow::Continue
    }
}

/// Queues every `(recipient, message)` pair of an outbox.
fn deliver(
    clients: &mut ClientRegistry,
    outbox: Vec<(ClientId, ServerMessage)>,
) {
    for (recipient, msg) in outbox {
        clients.send(recipient, msg);
    }
}

fn set_state(clients: &mut ClientRegistry, id: ClientId, state: ClientState) {
    if let Some(client) = clients.get_mut(id) {
        client.state = state;
    }
}

fn credentials(
    clients: &ClientRegistry,
    id: ClientId,
) -> Option<(String, String)> {
    clients
        .get(id)
        .map(|c| (c.nickname.clone(), c.session.clone()))
}

/// Voluntary exit from the current room, if any. Also used to vacate a
/// room before `CREATE`/`JOINROOM` reseat the client elsewhere.
fn leave_current_room(
    clients: &mut ClientRegistry,
    rooms: &mut RoomRegistry,
    id: ClientId,
) {
    let Some(room_id) = clients.get(id).and_then(|c| c.room) else {
        return;
    };
    match rooms.leave(room_id, id) {
        Ok(outcome) => {
            if let Some(client) = clients.get_mut(id) {
                client.room = None;
                client.state = ClientState::Lobby;
            }
            if let Some(remaining) = outcome.remaining {
                set_state(clients, remaining, ClientState::Waiting);
            }
            deliver(clients, outcome.outbox);
        }
        Err(err) => {
            tracing::warn!(%id, %err, "stale room back-reference, detaching");
            if let Some(client) = clients.get_mut(id) {
                client.room = None;
                client.state = ClientState::Lobby;
            }
        }
    }
}
