//! Room lifecycle management for noxo.
//!
//! A room holds two player slots around an embedded game. Slots remember
//! the `(name, session)` identity of whoever occupied them, which is what
//! makes bounded-grace reconnection possible: when a client vanishes
//! mid-game its slot is preserved, and a later `RECONNECT` with the same
//! credentials claims it back.
//!
//! Every operation runs under the server's single room lock and returns
//! an [`Outbox`] of `(recipient, message)` pairs for the caller to
//! deliver while still holding the lock — that is what makes broadcast
//! order atomic with the state change.

mod error;
mod registry;
mod room;

pub use error::RoomError;
pub use registry::{
    DeclineOutcome, DisconnectOutcome, JoinOutcome, LeaveOutcome, Outbox,
    PruneOutcome, ReconnectOutcome, RoomRegistry,
};
pub use room::{PlayerSlot, PreservedIdentity, Room, RoomStatus};
