//! The process-wide client table.

use std::collections::HashMap;

use noxo_protocol::{ClientId, ServerMessage};
use rand::Rng;
use tokio::sync::mpsc;

use crate::{Client, SessionError};

/// Invalid inputs tolerated before the session is terminated.
pub const INVALID_STRIKE_LIMIT: u32 = 3;

/// Heartbeat probes a client may leave unanswered. The counter is
/// incremented on every sweep and zeroed by `PONG|`; exceeding the limit
/// means the peer is unreachable.
pub const MAX_MISSED_PONGS: u32 = 3;

/// The global table of connected clients, keyed by [`ClientId`].
///
/// Bounded by `max_clients`: registration beyond the cap fails with
/// [`SessionError::ServerFull`] and the connection is rejected before a
/// record ever exists.
pub struct ClientRegistry {
    clients: HashMap<ClientId, Client>,
    next_id: u64,
    max_clients: usize,
}

impl ClientRegistry {
    /// Creates an empty table accepting at most `max_clients` records.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_id: 1,
            max_clients,
        }
    }

    /// Registers a freshly accepted connection: allocates an id,
    /// generates the session token, and inserts the record.
    ///
    /// # Errors
    /// [`SessionError::ServerFull`] when the table is at capacity.
    pub fn register(
        &mut self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ClientId, SessionError> {
        if self.clients.len() >= self.max_clients {
            return Err(SessionError::ServerFull);
        }
        let id = ClientId(self.next_id);
        self.next_id += 1;
        self.clients.insert(id, Client::new(generate_token(), sender));
        tracing::info!(client_id = %id, clients = self.clients.len(), "client registered");
        Ok(id)
    }

    /// Removes a record on worker exit. Dropping it also drops the
    /// outbound sender, which lets the writer task drain and close.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let removed = self.clients.remove(&id);
        if removed.is_some() {
            tracing::info!(client_id = %id, clients = self.clients.len(), "client removed");
        }
        removed
    }

    /// Looks up a record.
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Looks up a record mutably.
    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    /// Queues `msg` for `id`. Unknown ids are ignored — a recipient may
    /// legitimately have been removed between producing a broadcast and
    /// delivering it.
    pub fn send(&mut self, id: ClientId, msg: ServerMessage) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.send(msg);
            if !client.connected {
                tracing::debug!(client_id = %id, "outbound queue closed, marking disconnected");
            }
        }
    }

    /// Adds one invalid strike and reports whether the quota is reached.
    pub fn strike(&mut self, id: ClientId) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) => {
                client.invalid_count += 1;
                tracing::debug!(
                    client_id = %id,
                    strikes = client.invalid_count,
                    "invalid input"
                );
                client.invalid_count >= INVALID_STRIKE_LIMIT
            }
            None => false,
        }
    }

    /// Ids of all current records, for the heartbeat sweep.
    pub fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// `true` when no clients are connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Generates a random 16-character lowercase hex string (64 bits).
///
/// The token is the reconnect credential: the server hands it out once
/// per `JOIN` and accepts it back only when it matches a preserved slot.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<ServerMessage>,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_register_assigns_ids_and_tokens() {
        let mut reg = ClientRegistry::new(8);
        let (tx, _rx) = channel();
        let a = reg.register(tx.clone()).expect("should register");
        let b = reg.register(tx).expect("should register");

        assert_ne!(a, b);
        let ta = reg.get(a).unwrap().session.clone();
        let tb = reg.get(b).unwrap().session.clone();
        assert_eq!(ta.len(), 16);
        assert!(ta.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(ta, tb, "tokens must be unique per client");
    }

    #[test]
    fn test_register_at_capacity_returns_server_full() {
        let mut reg = ClientRegistry::new(1);
        let (tx, _rx) = channel();
        reg.register(tx.clone()).unwrap();

        assert_eq!(reg.register(tx), Err(SessionError::ServerFull));
    }

    #[test]
    fn test_remove_frees_capacity() {
        let mut reg = ClientRegistry::new(1);
        let (tx, _rx) = channel();
        let id = reg.register(tx.clone()).unwrap();
        assert!(reg.remove(id).is_some());
        assert!(reg.is_empty());

        assert!(reg.register(tx).is_ok());
    }

    #[test]
    fn test_send_queues_on_the_client_channel() {
        let mut reg = ClientRegistry::new(2);
        let (tx, mut rx) = channel();
        let id = reg.register(tx).unwrap();

        reg.send(id, ServerMessage::Hello);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Hello)));
    }

    #[test]
    fn test_send_to_closed_channel_marks_disconnected() {
        let mut reg = ClientRegistry::new(2);
        let (tx, rx) = channel();
        let id = reg.register(tx).unwrap();
        drop(rx); // writer task gone

        reg.send(id, ServerMessage::Hello);
        assert!(!reg.get(id).unwrap().connected);
    }

    #[test]
    fn test_send_to_unknown_id_is_ignored() {
        let mut reg = ClientRegistry::new(2);
        reg.send(ClientId(99), ServerMessage::Hello);
    }

    #[test]
    fn test_strike_reaches_quota_at_three() {
        let mut reg = ClientRegistry::new(2);
        let (tx, _rx) = channel();
        let id = reg.register(tx).unwrap();

        assert!(!reg.strike(id));
        assert!(!reg.strike(id));
        assert!(reg.strike(id), "third strike reaches the quota");
        assert_eq!(reg.get(id).unwrap().invalid_count, 3);
    }

    #[test]
    fn test_ids_are_sorted() {
        let mut reg = ClientRegistry::new(8);
        let (tx, _rx) = channel();
        let a = reg.register(tx.clone()).unwrap();
        let b = reg.register(tx.clone()).unwrap();
        let c = reg.register(tx).unwrap();
        assert_eq!(reg.ids(), vec![a, b, c]);
    }
}
