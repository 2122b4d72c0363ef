//! Client session management for noxo.
//!
//! This crate owns the server's record of every connected peer:
//!
//! 1. **The client record** ([`Client`]) — nickname, lobby/room state,
//!    liveness counters, invalid-input strikes, the session token, and
//!    the outbound message queue.
//! 2. **The client table** ([`ClientRegistry`]) — the process-wide
//!    registry, bounded by `max_clients`, that the connection workers
//!    and the heartbeat task share.
//!
//! # Concurrency note
//!
//! `ClientRegistry` is not thread-safe by itself — it is owned by the
//! server behind a single `tokio::sync::Mutex` (the client lock). When a
//! handler needs both registries, the client lock is taken before the
//! room lock, consistently.

mod client;
mod error;
mod registry;

pub use client::{Client, ClientState};
pub use error::SessionError;
pub use registry::{ClientRegistry, INVALID_STRIKE_LIMIT, MAX_MISSED_PONGS};
