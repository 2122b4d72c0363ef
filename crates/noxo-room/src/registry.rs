//! The process-wide room table.

use std::collections::BTreeMap;
use std::time::Duration;

use noxo_protocol::{
    truncate_name, ClientId, RoomId, RoomSummary, ServerMessage,
};

use crate::room::{Room, RoomStatus};
use crate::RoomError;

/// Messages produced by a room operation, delivered by the caller while
/// it still holds the registry locks.
pub type Outbox = Vec<(ClientId, ServerMessage)>;

/// Result of a successful join: the burst to deliver plus the incumbent,
/// whose state moves to Playing alongside the joiner's.
#[derive(Debug)]
pub struct JoinOutcome {
    pub outbox: Outbox,
    pub incumbent: ClientId,
}

/// Result of a voluntary leave. `remaining` is the player still seated,
/// who returns to waiting.
#[derive(Debug)]
pub struct LeaveOutcome {
    pub outbox: Outbox,
    pub remaining: Option<ClientId>,
}

/// Result of a declined replay; same shape as a leave.
#[derive(Debug)]
pub struct DeclineOutcome {
    pub outbox: Outbox,
    pub remaining: Option<ClientId>,
}

/// Result of routing an unannounced disconnect through a room.
#[derive(Debug)]
pub struct DisconnectOutcome {
    pub outbox: Outbox,
    pub remaining: Option<ClientId>,
}

/// Result of one pruner pass. `released` clients were awarded a forfeit
/// win and detached; they return to the lobby.
#[derive(Debug, Default)]
pub struct PruneOutcome {
    pub outbox: Outbox,
    pub released: Vec<ClientId>,
}

/// Result of a successful reconnect.
#[derive(Debug)]
pub struct ReconnectOutcome {
    pub room_id: RoomId,
    pub outbox: Outbox,
    /// The still-present opponent, if any; they move back to Playing.
    pub opponent: Option<ClientId>,
    /// Whether the rejoiner resumes in a Playing room.
    pub playing: bool,
}

/// The global table of rooms, keyed by id.
///
/// A `BTreeMap` keeps iteration in id order, which makes `LIST`
/// snapshots and reconnect scans deterministic. Rooms are bounded by
/// `max_rooms`; a room is removed the moment its last live occupant is
/// gone.
pub struct RoomRegistry {
    rooms: BTreeMap<RoomId, Room>,
    next_id: u64,
    max_rooms: usize,
}

impl RoomRegistry {
    /// Creates an empty table accepting at most `max_rooms` rooms.
    pub fn new(max_rooms: usize) -> Self {
        Self {
            rooms: BTreeMap::new(),
            next_id: 0,
            max_rooms,
        }
    }

    /// Creates a room with `creator` seated in p1.
    ///
    /// # Errors
    /// [`RoomError::LobbyFull`] at the `max_rooms` cap.
    pub fn create(
        &mut self,
        name: &str,
        creator: ClientId,
        creator_name: &str,
        creator_session: &str,
    ) -> Result<(RoomId, Outbox), RoomError> {
        if self.rooms.len() >= self.max_rooms {
            return Err(RoomError::LobbyFull);
        }
        let id = RoomId(self.next_id);
        self.next_id += 1;

        let name = truncate_name(name);
        let room = Room::new(
            id,
            name.clone(),
            creator,
            creator_name.to_string(),
            creator_session.to_string(),
        );
        self.rooms.insert(id, room);
        tracing::info!(room_id = %id, rooms = self.rooms.len(), "room created");

        let outbox = vec![(creator, ServerMessage::Created { id, name })];
        Ok((id, outbox))
    }

    /// Seats `joiner` in room `id` and starts round 1.
    pub fn join(
        &mut self,
        id: RoomId,
        joiner: ClientId,
        joiner_name: &str,
        joiner_session: &str,
    ) -> Result<JoinOutcome, RoomError> {
        let room =
            self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        let (outbox, incumbent) = room.join(
            joiner,
            joiner_name.to_string(),
            joiner_session.to_string(),
        )?;
        tracing::info!(room_id = %id, client_id = %joiner, "player joined, game starting");
        Ok(JoinOutcome { outbox, incumbent })
    }

    /// Voluntary exit from room `id`.
    pub fn leave(
        &mut self,
        id: RoomId,
        leaver: ClientId,
    ) -> Result<LeaveOutcome, RoomError> {
        let room =
            self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        let (outbox, remaining) = room.leave(leaver)?;
        self.drop_if_dead(id);
        Ok(LeaveOutcome { outbox, remaining })
    }

    /// Applies a move in room `id`.
    pub fn play(
        &mut self,
        id: RoomId,
        mover: ClientId,
        x: u8,
        y: u8,
    ) -> Result<Outbox, RoomError> {
        let room =
            self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        room.play(mover, x, y)
    }

    /// Records a `REPLAY|YES` vote in room `id`.
    pub fn vote_replay(
        &mut self,
        id: RoomId,
        voter: ClientId,
    ) -> Result<Outbox, RoomError> {
        let room =
            self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        room.vote_replay(voter)
    }

    /// Handles a `REPLAY|NO` in room `id`.
    pub fn decline_replay(
        &mut self,
        id: RoomId,
        decliner: ClientId,
    ) -> Result<DeclineOutcome, RoomError> {
        let room =
            self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        let (outbox, remaining) = room.decline_replay(decliner)?;
        self.drop_if_dead(id);
        Ok(DeclineOutcome { outbox, remaining })
    }

    /// Routes an unannounced disconnect through room `id`.
    pub fn handle_disconnect(
        &mut self,
        id: RoomId,
        client: ClientId,
        grace: Duration,
    ) -> Result<DisconnectOutcome, RoomError> {
        let room =
            self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        let (outbox, remaining) = room.handle_disconnect(client, grace)?;
        self.drop_if_dead(id);
        Ok(DisconnectOutcome { outbox, remaining })
    }

    /// Sweeps all rooms for preserved slots past the grace window and
    /// forfeits them to the survivor.
    pub fn prune(&mut self, grace: Duration) -> PruneOutcome {
        let expired: Vec<_> = self
            .rooms
            .iter()
            .filter_map(|(id, room)| {
                room.expired_slot(grace).map(|slot| (*id, slot))
            })
            .collect();

        let mut outcome = PruneOutcome::default();
        for (id, slot) in expired {
            let Some(room) = self.rooms.remove(&id) else {
                continue;
            };
            if let Some(survivor) = room.slot(slot.other()).occupant {
                outcome.outbox.push((
                    survivor,
                    ServerMessage::Info(
                        "Opponent did not return in time".to_string(),
                    ),
                ));
                outcome.outbox.push((survivor, ServerMessage::Win));
                outcome.released.push(survivor);
            }
            tracing::info!(room_id = %id, "grace period expired, room forfeited");
        }
        outcome
    }

    /// Matches `(name, session)` against every preserved slot, in room-id
    /// order, and reseats `rejoiner` on the first hit.
    ///
    /// # Errors
    /// [`RoomError::InvalidSession`] when a preserved slot carries the
    /// name but a different token; [`RoomError::NoReconnectSlot`] when no
    /// preserved slot carries the name at all.
    pub fn reconnect(
        &mut self,
        rejoiner: ClientId,
        name: &str,
        session: &str,
    ) -> Result<ReconnectOutcome, RoomError> {
        let mut name_matched = false;
        let mut target = None;
        for (id, room) in &self.rooms {
            if let Some(slot) = room.preserved_slot_named(name) {
                name_matched = true;
                let token_ok = room
                    .slot(slot)
                    .identity
                    .as_ref()
                    .is_some_and(|i| i.session == session);
                if token_ok {
                    target = Some((*id, slot));
                    break;
                }
            }
        }
        let Some((room_id, slot)) = target else {
            return Err(if name_matched {
                RoomError::InvalidSession(name.to_string())
            } else {
                RoomError::NoReconnectSlot(name.to_string())
            });
        };

        let room = self
            .rooms
            .get_mut(&room_id)
            .expect("room located by the scan above");
        let (outbox, opponent, playing) =
            room.attach_reconnect(rejoiner, slot);
        tracing::info!(room_id = %room_id, client_id = %rejoiner, "player reconnected");
        Ok(ReconnectOutcome {
            room_id,
            outbox,
            opponent,
            playing,
        })
    }

    /// Listing snapshot, rooms in id order.
    pub fn list(&self) -> Vec<RoomSummary> {
        self.rooms
            .values()
            .map(|room| RoomSummary {
                id: room.id,
                name: room.name.clone(),
                playing: room.status == RoomStatus::Playing,
                occupied: room.occupied(),
            })
            .collect()
    }

    /// Looks up a room.
    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// Number of active rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// `true` when no rooms exist.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn drop_if_dead(&mut self, id: RoomId) {
        if self.rooms.get(&id).is_some_and(Room::is_dead) {
            self.rooms.remove(&id);
            tracing::info!(room_id = %id, rooms = self.rooms.len(), "room removed");
        }
    }
}
