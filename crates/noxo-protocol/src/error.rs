//! Error types for the protocol layer.

/// Errors produced while parsing an inbound line.
///
/// Every variant counts as one invalid strike against the sender; the
/// server maps each to the matching `ERROR|…` reply text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line exceeds [`MAX_LINE_BYTES`](crate::MAX_LINE_BYTES).
    #[error("line exceeds {} bytes", crate::MAX_LINE_BYTES)]
    LineTooLong,

    /// The line does not start with the `##` frame prefix.
    #[error("missing ## prefix")]
    MissingPrefix,

    /// The TAG is not in the command table.
    #[error("unknown command tag `{0}`")]
    UnknownCommand(String),

    /// `MOVE` without two non-negative integer arguments.
    #[error("malformed MOVE arguments")]
    BadMove,

    /// `RECONNECT` without both a name and a session token.
    #[error("malformed RECONNECT arguments")]
    BadReconnect,

    /// `JOINROOM` with a non-numeric room id.
    #[error("malformed room id")]
    BadRoomId,
}
