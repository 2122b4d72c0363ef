//! A single room: two slots, an embedded game, and the per-room flows.

use std::time::{Duration, Instant};

use noxo_game::{Cell, Game, Slot, Status};
use noxo_protocol::{ClientId, RoomId, ServerMessage};

use crate::registry::Outbox;
use crate::RoomError;

/// The `(name, session)` pair kept on a slot for the reconnect window.
///
/// Written when a client is seated and kept when it vanishes; a later
/// `RECONNECT` must present exactly this pair to reclaim the slot.
/// Voluntary exits (EXIT, REPLAY|NO) clear it — they forfeit the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedIdentity {
    pub name: String,
    pub session: String,
}

/// One of the two player positions inside a room.
#[derive(Debug, Default)]
pub struct PlayerSlot {
    /// The live client currently seated here, if any.
    pub occupant: Option<ClientId>,
    /// Identity of the last occupant, kept for reconnect matching.
    pub identity: Option<PreservedIdentity>,
    /// Set when the occupant vanished unannounced while the opponent
    /// was still present.
    pub disconnected: bool,
    /// When the occupant vanished; drives the grace-period pruner.
    pub disconnected_at: Option<Instant>,
    /// This side's vote for another round.
    pub replay_vote: bool,
}

impl PlayerSlot {
    fn seat(&mut self, client: ClientId, name: String, session: String) {
        *self = PlayerSlot {
            occupant: Some(client),
            identity: Some(PreservedIdentity { name, session }),
            ..PlayerSlot::default()
        };
    }

    fn clear(&mut self) {
        *self = PlayerSlot::default();
    }

    /// `true` when a live client is seated here.
    pub fn is_live(&self) -> bool {
        self.occupant.is_some()
    }

    /// `true` when this slot is vacated but reconnect-eligible.
    pub fn is_preserved(&self) -> bool {
        self.disconnected && self.occupant.is_none() && self.identity.is_some()
    }

    fn display_name(&self) -> &str {
        self.identity.as_ref().map_or("Unknown", |i| i.name.as_str())
    }
}

/// The lifecycle state of a room. A room with no live occupant is
/// removed from the table outright, so there is no `Empty` variant to
/// observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// One live occupant (and possibly one preserved slot).
    Waiting,
    /// Both slots live, game in progress.
    Playing,
}

/// A room: id, display name, two slots, and the embedded game.
///
/// Invariants maintained across every flow: a `Playing` room has two
/// live slots; the game's turn never references a vacant slot; the
/// starting player holds X.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub game: Game,
    /// The slot that receives X and the first turn; flipped on each
    /// accepted replay.
    pub starting_player: Slot,
    slots: [PlayerSlot; 2],
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        name: String,
        creator: ClientId,
        creator_name: String,
        creator_session: String,
    ) -> Self {
        let mut slots = [PlayerSlot::default(), PlayerSlot::default()];
        slots[0].seat(creator, creator_name, creator_session);
        Self {
            id,
            name,
            status: RoomStatus::Waiting,
            game: Game::new(),
            starting_player: Slot::P1,
            slots,
        }
    }

    /// The slot structure at position `slot`.
    pub fn slot(&self, slot: Slot) -> &PlayerSlot {
        &self.slots[slot.index()]
    }

    /// The slot position `client` occupies, if any.
    pub fn slot_of(&self, client: ClientId) -> Option<Slot> {
        [Slot::P1, Slot::P2]
            .into_iter()
            .find(|s| self.slots[s.index()].occupant == Some(client))
    }

    /// Number of live occupants.
    pub fn occupied(&self) -> u8 {
        self.slots.iter().filter(|s| s.is_live()).count() as u8
    }

    /// `true` once no live client remains; the registry then drops the
    /// room.
    pub(crate) fn is_dead(&self) -> bool {
        !self.slots.iter().any(PlayerSlot::is_live)
    }

    fn live_occupants(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.slots.iter().filter_map(|s| s.occupant)
    }

    fn reset_replay_votes(&mut self) {
        self.slots[0].replay_vote = false;
        self.slots[1].replay_vote = false;
    }

    // -----------------------------------------------------------------
    // Join
    // -----------------------------------------------------------------

    /// Seats `joiner` in the free slot and starts round 1.
    ///
    /// The room is first normalised so the lone live occupant sits in
    /// p1; the joiner always becomes p2. A preserved-disconnected slot
    /// is overwritten — joining a half-abandoned room ends the old
    /// game's reconnect eligibility.
    pub(crate) fn join(
        &mut self,
        joiner: ClientId,
        name: String,
        session: String,
    ) -> Result<(Outbox, ClientId), RoomError> {
        if self.slot_of(joiner).is_some() {
            return Err(RoomError::SelfJoin);
        }
        if self.slots[0].is_live() && self.slots[1].is_live() {
            return Err(RoomError::RoomFull(self.id));
        }
        if !self.slots[0].is_live() && self.slots[1].is_live() {
            self.slots.swap(0, 1);
        }
        let incumbent = self.slots[0]
            .occupant
            .expect("a joinable room keeps its lone occupant in p1");

        self.slots[1].seat(joiner, name, session);
        self.status = RoomStatus::Playing;
        self.starting_player = Slot::P1;

        let mut outbox = vec![(
            joiner,
            ServerMessage::JoinedRoom {
                id: self.id,
                name: self.name.clone(),
            },
        )];
        outbox.extend(self.begin_round());
        Ok((outbox, incumbent))
    }

    /// Round-start burst: `CLEAR|`, `START|Opponent:<other>`, the
    /// symbols, and `TURN|Your move` to the starter.
    fn begin_round(&mut self) -> Outbox {
        self.reset_replay_votes();
        self.game.reset(self.starting_player);

        let mut outbox = Outbox::new();
        for s in [Slot::P1, Slot::P2] {
            if let Some(id) = self.slots[s.index()].occupant {
                let opponent =
                    self.slots[s.other().index()].display_name().to_string();
                outbox.push((id, ServerMessage::Clear));
                outbox.push((id, ServerMessage::Start { opponent }));
                outbox.push((
                    id,
                    ServerMessage::Symbol(self.game.mark_of(s).as_char()),
                ));
            }
        }
        if let Some(starter) =
            self.slots[self.starting_player.index()].occupant
        {
            outbox.push((starter, ServerMessage::Turn));
        }
        outbox
    }

    // -----------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------

    /// Applies a move by `mover` and produces the broadcast burst.
    pub(crate) fn play(
        &mut self,
        mover: ClientId,
        x: u8,
        y: u8,
    ) -> Result<Outbox, RoomError> {
        let slot = self
            .slot_of(mover)
            .ok_or(RoomError::NotInRoom(mover, self.id))?;
        let status = self.game.play(slot, x, y)?;
        let mover_name =
            self.slots[slot.index()].display_name().to_string();

        let mut outbox = Outbox::new();
        for id in self.live_occupants() {
            outbox.push((
                id,
                ServerMessage::Move {
                    mover: mover_name.clone(),
                    x,
                    y,
                },
            ));
        }

        match status {
            Status::Running => {
                // The toggled turn may reference a vacated slot while the
                // opponent is in its reconnect window; the prompt is then
                // replayed to them on reattach.
                if let Some(next) = self.game.current_turn() {
                    if let Some(id) = self.slots[next.index()].occupant {
                        outbox.push((id, ServerMessage::Turn));
                    }
                }
            }
            Status::Won => {
                outbox.push((mover, ServerMessage::Win));
                if let Some(loser) =
                    self.slots[slot.other().index()].occupant
                {
                    outbox.push((
                        loser,
                        ServerMessage::Lose { winner: mover_name },
                    ));
                }
                self.finish_round(&mut outbox, mover, slot);
            }
            Status::Draw => {
                for id in self.live_occupants() {
                    outbox.push((id, ServerMessage::Draw));
                }
                self.finish_round(&mut outbox, mover, slot);
            }
        }
        Ok(outbox)
    }

    /// Common tail of a terminal move: votes reset; if the opponent's
    /// slot is vacant the game cannot continue, so the remaining player
    /// is told and the room returns to waiting.
    fn finish_round(&mut self, outbox: &mut Outbox, mover: ClientId, slot: Slot) {
        self.reset_replay_votes();
        if !self.slots[slot.other().index()].is_live() {
            outbox.push((mover, ServerMessage::Info("Game ended".to_string())));
            self.status = RoomStatus::Waiting;
        }
    }

    // -----------------------------------------------------------------
    // Replay voting
    // -----------------------------------------------------------------

    /// Records a `REPLAY|YES` vote; when both sides have voted and both
    /// are present, the next round starts with the starter flipped.
    pub(crate) fn vote_replay(
        &mut self,
        voter: ClientId,
    ) -> Result<Outbox, RoomError> {
        let slot = self
            .slot_of(voter)
            .ok_or(RoomError::NotInRoom(voter, self.id))?;
        self.slots[slot.index()].replay_vote = true;

        let mut outbox = vec![(
            voter,
            ServerMessage::Info("Replay confirmed".to_string()),
        )];
        let both_live = self.slots[0].is_live() && self.slots[1].is_live();
        let both_voted =
            self.slots[0].replay_vote && self.slots[1].replay_vote;
        if both_live && both_voted {
            outbox.extend(self.restart_round());
        }
        Ok(outbox)
    }

    /// Restart burst: starter flipped, fresh board, `RESTART|`, the
    /// re-dealt symbols, and the first turn prompt.
    fn restart_round(&mut self) -> Outbox {
        self.starting_player = self.starting_player.other();
        self.reset_replay_votes();
        self.game.reset(self.starting_player);
        self.status = RoomStatus::Playing;

        let mut outbox = Outbox::new();
        for id in self.live_occupants() {
            outbox.push((id, ServerMessage::Restart));
        }
        for s in [self.starting_player, self.starting_player.other()] {
            if let Some(id) = self.slots[s.index()].occupant {
                outbox.push((
                    id,
                    ServerMessage::Symbol(self.game.mark_of(s).as_char()),
                ));
            }
        }
        if let Some(starter) =
            self.slots[self.starting_player.index()].occupant
        {
            outbox.push((starter, ServerMessage::Turn));
        }
        outbox
    }

    /// `REPLAY|NO`: a voluntary exit scoped to the replay point. The
    /// declining slot is cleared without preserving its identity.
    pub(crate) fn decline_replay(
        &mut self,
        decliner: ClientId,
    ) -> Result<(Outbox, Option<ClientId>), RoomError> {
        let slot = self
            .slot_of(decliner)
            .ok_or(RoomError::NotInRoom(decliner, self.id))?;

        let mut outbox = vec![(
            decliner,
            ServerMessage::Info("You declined replay".to_string()),
        )];
        let remaining = self.slots[slot.other().index()].occupant;
        if let Some(other) = remaining {
            outbox.push((
                other,
                ServerMessage::Info("Opponent declined replay".to_string()),
            ));
            self.status = RoomStatus::Waiting;
        }
        self.game.vacate_turn(slot);
        self.slots[slot.index()].clear();
        self.reset_replay_votes();
        outbox.push((decliner, ServerMessage::Exited));
        Ok((outbox, remaining))
    }

    // -----------------------------------------------------------------
    // Leaving and vanishing
    // -----------------------------------------------------------------

    /// Voluntary `EXIT|`: clears the slot *including* its preserved
    /// identity — no reconnect for a player who chose to leave. A
    /// mid-game exit forfeits to the opponent.
    pub(crate) fn leave(
        &mut self,
        leaver: ClientId,
    ) -> Result<(Outbox, Option<ClientId>), RoomError> {
        let slot = self
            .slot_of(leaver)
            .ok_or(RoomError::NotInRoom(leaver, self.id))?;
        let was_playing = self.status == RoomStatus::Playing;

        self.game.vacate_turn(slot);
        self.slots[slot.index()].clear();
        self.reset_replay_votes();

        let mut outbox = vec![(leaver, ServerMessage::Exited)];
        let remaining = self.slots[slot.other().index()].occupant;
        if let Some(other) = remaining {
            if was_playing {
                outbox.push((
                    other,
                    ServerMessage::Info("Opponent left".to_string()),
                ));
                outbox.push((other, ServerMessage::Win));
            }
            self.status = RoomStatus::Waiting;
        }
        Ok((outbox, remaining))
    }

    /// Unannounced disconnect: the slot keeps its identity and becomes
    /// reconnect-eligible while the opponent remains; the grace window
    /// starts now.
    pub(crate) fn handle_disconnect(
        &mut self,
        client: ClientId,
        grace: Duration,
    ) -> Result<(Outbox, Option<ClientId>), RoomError> {
        let slot = self
            .slot_of(client)
            .ok_or(RoomError::NotInRoom(client, self.id))?;
        let remaining = self.slots[slot.other().index()].occupant;

        let vacated = &mut self.slots[slot.index()];
        vacated.occupant = None;
        vacated.disconnected = remaining.is_some();
        vacated.disconnected_at = Some(Instant::now());
        if remaining.is_none() {
            // No opponent left to wait — nothing to preserve.
            vacated.identity = None;
        }
        self.game.vacate_turn(slot);

        let mut outbox = Outbox::new();
        if let Some(other) = remaining {
            outbox.push((
                other,
                ServerMessage::Info(format!(
                    "Opponent disconnected, waiting {} s to reconnect",
                    grace.as_secs()
                )),
            ));
            self.status = RoomStatus::Waiting;
        }
        Ok((outbox, remaining))
    }

    /// The preserved slot whose grace window has elapsed, if any.
    pub(crate) fn expired_slot(&self, grace: Duration) -> Option<Slot> {
        [Slot::P1, Slot::P2].into_iter().find(|s| {
            let slot = &self.slots[s.index()];
            slot.is_preserved()
                && slot
                    .disconnected_at
                    .is_some_and(|at| at.elapsed() >= grace)
        })
    }

    // -----------------------------------------------------------------
    // Reconnect
    // -----------------------------------------------------------------

    /// The preserved slot carrying `name`, if any.
    pub(crate) fn preserved_slot_named(&self, name: &str) -> Option<Slot> {
        [Slot::P1, Slot::P2].into_iter().find(|s| {
            let slot = &self.slots[s.index()];
            slot.is_preserved()
                && slot.identity.as_ref().is_some_and(|i| i.name == name)
        })
    }

    /// Reseats `rejoiner` in its preserved slot and replays the in-flight
    /// game: `RECONNECTED|`, the opponent, the symbol, one `MOVE` per
    /// non-blank cell (rows then columns), and `TURN|` if the rejoiner is
    /// on move.
    pub(crate) fn attach_reconnect(
        &mut self,
        rejoiner: ClientId,
        slot: Slot,
    ) -> (Outbox, Option<ClientId>, bool) {
        let reclaimed = &mut self.slots[slot.index()];
        reclaimed.occupant = Some(rejoiner);
        reclaimed.disconnected = false;
        reclaimed.disconnected_at = None;

        // A turn dropped when this player vanished comes back to them.
        self.game.restore_turn(slot);

        let opponent = self.slots[slot.other().index()].occupant;
        let playing = opponent.is_some();
        self.status = if playing {
            RoomStatus::Playing
        } else {
            RoomStatus::Waiting
        };

        let opponent_name =
            self.slots[slot.other().index()].display_name().to_string();
        let mut outbox = vec![
            (rejoiner, ServerMessage::Reconnected),
            (rejoiner, ServerMessage::Start { opponent: opponent_name }),
            (
                rejoiner,
                ServerMessage::Symbol(self.game.mark_of(slot).as_char()),
            ),
        ];
        for (x, y, cell) in self.game.cells() {
            if cell == Cell::Empty {
                continue;
            }
            let owner = self.game.slot_of_mark(cell);
            let mover =
                self.slots[owner.index()].display_name().to_string();
            outbox.push((rejoiner, ServerMessage::Move { mover, x, y }));
        }
        if self.game.current_turn() == Some(slot) {
            outbox.push((rejoiner, ServerMessage::TurnReplay));
        }
        if let Some(other) = opponent {
            outbox.push((
                other,
                ServerMessage::Info("Opponent reconnected".to_string()),
            ));
        }
        (outbox, opponent, playing)
    }
}
