//! # noxo
//!
//! A multiplayer Tic-Tac-Toe service: a long-running TCP server hosting
//! many concurrent two-player matches organised into named rooms.
//!
//! Clients speak the line-oriented `##TAG|arg|…` protocol: they pick a
//! nickname, create or join a room, exchange moves in strict turn order,
//! and vote on replays. An unannounced disconnect preserves the player's
//! slot for a bounded grace period, during which the same `(name,
//! session)` credentials can reclaim it and resume the game.
//!
//! The server ties the layers together: transport → protocol → session →
//! room, with one worker task per connection and a single background
//! heartbeat/pruner task driving liveness and grace-period cleanup.

mod config;
mod error;
mod handler;
mod heartbeat;
mod server;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{NoxoServer, NoxoServerBuilder};
