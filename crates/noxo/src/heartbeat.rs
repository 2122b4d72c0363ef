//! The background liveness task: periodic PING sweep, PONG accounting,
//! forced disconnects, and the grace-period pruner.
//!
//! One task per server. Each cycle takes the client lock, probes every
//! record, then takes the room lock (the global lock order) to route
//! expired clients through the disconnect handler and to prune rooms
//! whose preserved slot has outlived `disconnect_grace`.

use std::sync::Arc;

use noxo_protocol::ServerMessage;
use noxo_session::{ClientState, MAX_MISSED_PONGS};
use tokio::time::MissedTickBehavior;

use crate::server::ServerState;

/// Spawns the heartbeat/pruner task for `state`.
pub(crate) fn spawn(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(state.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&state).await;
        }
    });
}

/// One heartbeat cycle.
async fn sweep(state: &Arc<ServerState>) {
    let mut clients = state.clients.lock().await;

    // Probe every record; collect the unreachable ones.
    let mut dead = Vec::new();
    for id in clients.ids() {
        let Some(client) = clients.get_mut(id) else {
            continue;
        };
        if !client.connected || !client.alive {
            dead.push(id);
            continue;
        }
        client.send(ServerMessage::Ping);
        client.missed_pongs += 1;
        if client.missed_pongs > MAX_MISSED_PONGS || !client.connected {
            dead.push(id);
        }
    }

    let mut rooms = state.rooms.lock().await;

    for id in dead {
        tracing::info!(client_id = %id, "heartbeat expired, disconnecting");
        if let Some(room_id) = clients.get(id).and_then(|c| c.room) {
            if let Ok(outcome) = rooms.handle_disconnect(
                room_id,
                id,
                state.config.disconnect_grace,
            ) {
                if let Some(remaining) = outcome.remaining {
                    if let Some(client) = clients.get_mut(remaining) {
                        client.state = ClientState::Waiting;
                    }
                }
                for (recipient, msg) in outcome.outbox {
                    clients.send(recipient, msg);
                }
            }
        }
        // Dropping the record closes the outbound queue; the writer task
        // drains and half-closes the socket, and the worker's read loop
        // observes the close or times out.
        clients.remove(id);
    }

    // Reap rooms whose preserved slot outlived the grace window.
    let outcome = rooms.prune(state.config.disconnect_grace);
    for (recipient, msg) in outcome.outbox {
        clients.send(recipient, msg);
    }
    for survivor in outcome.released {
        if let Some(client) = clients.get_mut(survivor) {
            client.room = None;
            client.state = ClientState::Lobby;
        }
    }
}
