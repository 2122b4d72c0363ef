//! Wire protocol for the noxo game server.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ClientCommand`], [`ServerMessage`], the id newtypes) —
//!   everything that travels on the wire or names a wire participant.
//! - **Codec** ([`codec::encode`], [`codec::parse`]) — the line framing:
//!   `##TAG|arg|…\n`, one message per line.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while parsing.
//!
//! The protocol layer sits between transport (raw lines) and the server's
//! handlers. It doesn't know about connections or rooms — it only knows
//! how to turn lines into commands and messages into lines.

mod codec;
mod error;
mod types;

pub use codec::{encode, parse, MAX_LINE_BYTES};
pub use error::ProtocolError;
pub use types::{
    truncate_name, ClientCommand, ClientId, RoomId, RoomSummary,
    ServerMessage, MAX_NAME_BYTES,
};
