//! Line codec for the `##TAG|arg|…` wire format.
//!
//! Every message is a single ASCII line terminated by `\n`, prefixed with
//! the two literal characters `##`, followed by a TAG and zero or more
//! `|`-separated arguments. Messages without arguments still carry one
//! trailing pipe (`##HELLO|`), and an empty trailing argument after a
//! final `|` is valid on input.

use crate::{ClientCommand, ProtocolError, RoomId, ServerMessage};

/// Maximum accepted length of one inbound line, in bytes, after the
/// trailing CR/LF has been stripped. Longer lines are rejected and cost
/// the sender one invalid strike.
pub const MAX_LINE_BYTES: usize = 512;

// ---------------------------------------------------------------------------
// Encoding (server → client)
// ---------------------------------------------------------------------------

/// Encodes a [`ServerMessage`] into its complete wire line, including the
/// trailing newline.
pub fn encode(msg: &ServerMessage) -> String {
    use ServerMessage::*;
    match msg {
        Hello => "##HELLO|\n".to_string(),
        Joined(name) => format!("##JOINED|{name}\n"),
        Session(token) => format!("##SESSION|{token}\n"),
        Reconnected => "##RECONNECTED|\n".to_string(),
        Created { id, name } => format!("##CREATED|{}|{name}\n", id.0),
        JoinedRoom { id, name } => format!("##JOINEDROOM|{}|{name}\n", id.0),
        Exited => "##EXITED|\n".to_string(),
        Rooms(rooms) => {
            let mut line = format!("##ROOMS|{}", rooms.len());
            for room in rooms {
                let state = if room.playing { "PLAYING" } else { "WAITING" };
                line.push_str(&format!(
                    "|{}|{}|{state}|{}/2",
                    room.id.0, room.name, room.occupied
                ));
            }
            line.push('\n');
            line
        }
        Start { opponent } => format!("##START|Opponent:{opponent}\n"),
        Symbol(mark) => format!("##SYMBOL|{mark}\n"),
        Clear => "##CLEAR|\n".to_string(),
        Restart => "##RESTART|\n".to_string(),
        Turn => "##TURN|Your move\n".to_string(),
        TurnReplay => "##TURN|\n".to_string(),
        Move { mover, x, y } => format!("##MOVE|{mover}|{x}|{y}\n"),
        Win => "##WIN|You\n".to_string(),
        Lose { winner } => format!("##LOSE|{winner}\n"),
        Draw => "##DRAW|\n".to_string(),
        Info(text) => format!("##INFO|{text}\n"),
        Error(text) => format!("##ERROR|{text}\n"),
        Bye => "##BYE|\n".to_string(),
        Ping => "##PING|\n".to_string(),
        Pong => "##PONG|\n".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parsing (client → server)
// ---------------------------------------------------------------------------

/// Parses one inbound line into a [`ClientCommand`].
///
/// The line may still carry its trailing `\n` or `\r\n`; both are
/// stripped before any other check.
///
/// # Errors
/// Every error variant counts as one invalid strike — see
/// [`ProtocolError`] for the mapping to `ERROR|…` reply texts.
pub fn parse(line: &str) -> Result<ClientCommand, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::LineTooLong);
    }
    let body = line
        .strip_prefix("##")
        .ok_or(ProtocolError::MissingPrefix)?;

    let (tag, rest) = match body.split_once('|') {
        Some((tag, rest)) => (tag, Some(rest)),
        None => (body, None),
    };
    let args: Vec<&str> = match rest {
        Some(rest) => rest.split('|').collect(),
        None => Vec::new(),
    };
    let first = args.first().copied().unwrap_or("");

    match tag {
        "JOIN" => Ok(ClientCommand::Join {
            name: first.to_string(),
        }),
        "RECONNECT" => {
            let session = args.get(1).copied().unwrap_or("");
            if first.is_empty() || session.is_empty() {
                return Err(ProtocolError::BadReconnect);
            }
            Ok(ClientCommand::Reconnect {
                name: first.to_string(),
                session: session.to_string(),
            })
        }
        "CREATE" => Ok(ClientCommand::Create {
            name: first.to_string(),
        }),
        "JOINROOM" => {
            let id = first.parse().map_err(|_| ProtocolError::BadRoomId)?;
            Ok(ClientCommand::JoinRoom { id: RoomId(id) })
        }
        "EXIT" => Ok(ClientCommand::Exit),
        "LIST" => Ok(ClientCommand::List),
        "MOVE" => {
            let x = first.parse().map_err(|_| ProtocolError::BadMove)?;
            let y = args
                .get(1)
                .and_then(|a| a.parse().ok())
                .ok_or(ProtocolError::BadMove)?;
            Ok(ClientCommand::Move { x, y })
        }
        "REPLAY" => match first {
            "YES" => Ok(ClientCommand::Replay { accept: true }),
            "NO" => Ok(ClientCommand::Replay { accept: false }),
            _ => Err(ProtocolError::UnknownCommand("REPLAY".to_string())),
        },
        "QUIT" => Ok(ClientCommand::Quit),
        "PING" => Ok(ClientCommand::Ping),
        "PONG" => Ok(ClientCommand::Pong),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomSummary;

    // -- encode -----------------------------------------------------------

    #[test]
    fn test_encode_zero_argument_messages_carry_trailing_pipe() {
        assert_eq!(encode(&ServerMessage::Hello), "##HELLO|\n");
        assert_eq!(encode(&ServerMessage::Clear), "##CLEAR|\n");
        assert_eq!(encode(&ServerMessage::Restart), "##RESTART|\n");
        assert_eq!(encode(&ServerMessage::Draw), "##DRAW|\n");
        assert_eq!(encode(&ServerMessage::Bye), "##BYE|\n");
        assert_eq!(encode(&ServerMessage::Ping), "##PING|\n");
        assert_eq!(encode(&ServerMessage::Pong), "##PONG|\n");
        assert_eq!(encode(&ServerMessage::Exited), "##EXITED|\n");
        assert_eq!(encode(&ServerMessage::Reconnected), "##RECONNECTED|\n");
    }

    #[test]
    fn test_encode_turn_variants() {
        assert_eq!(encode(&ServerMessage::Turn), "##TURN|Your move\n");
        assert_eq!(encode(&ServerMessage::TurnReplay), "##TURN|\n");
    }

    #[test]
    fn test_encode_move_broadcast() {
        let msg = ServerMessage::Move {
            mover: "alice".to_string(),
            x: 2,
            y: 0,
        };
        assert_eq!(encode(&msg), "##MOVE|alice|2|0\n");
    }

    #[test]
    fn test_encode_win_lose() {
        assert_eq!(encode(&ServerMessage::Win), "##WIN|You\n");
        let lose = ServerMessage::Lose {
            winner: "alice".to_string(),
        };
        assert_eq!(encode(&lose), "##LOSE|alice\n");
    }

    #[test]
    fn test_encode_created_and_joinedroom() {
        let created = ServerMessage::Created {
            id: RoomId(0),
            name: "r1".to_string(),
        };
        assert_eq!(encode(&created), "##CREATED|0|r1\n");
        let joined = ServerMessage::JoinedRoom {
            id: RoomId(7),
            name: "arena".to_string(),
        };
        assert_eq!(encode(&joined), "##JOINEDROOM|7|arena\n");
    }

    #[test]
    fn test_encode_empty_room_listing() {
        assert_eq!(encode(&ServerMessage::Rooms(Vec::new())), "##ROOMS|0\n");
    }

    #[test]
    fn test_encode_room_listing_appends_one_segment_per_room() {
        let rooms = vec![
            RoomSummary {
                id: RoomId(1),
                name: "first".to_string(),
                playing: false,
                occupied: 1,
            },
            RoomSummary {
                id: RoomId(3),
                name: "second".to_string(),
                playing: true,
                occupied: 2,
            },
        ];
        assert_eq!(
            encode(&ServerMessage::Rooms(rooms)),
            "##ROOMS|2|1|first|WAITING|1/2|3|second|PLAYING|2/2\n"
        );
    }

    #[test]
    fn test_encode_start_names_the_opponent() {
        let msg = ServerMessage::Start {
            opponent: "bob".to_string(),
        };
        assert_eq!(encode(&msg), "##START|Opponent:bob\n");
    }

    // -- parse ------------------------------------------------------------

    #[test]
    fn test_parse_join_with_name() {
        assert_eq!(
            parse("##JOIN|alice\n"),
            Ok(ClientCommand::Join {
                name: "alice".to_string()
            })
        );
    }

    #[test]
    fn test_parse_strips_crlf() {
        assert_eq!(parse("##LIST|\r\n"), Ok(ClientCommand::List));
        assert_eq!(parse("##QUIT|"), Ok(ClientCommand::Quit));
    }

    #[test]
    fn test_parse_accepts_tag_without_any_pipe() {
        assert_eq!(parse("##EXIT"), Ok(ClientCommand::Exit));
        assert_eq!(parse("##PONG"), Ok(ClientCommand::Pong));
    }

    #[test]
    fn test_parse_move_arguments() {
        assert_eq!(
            parse("##MOVE|0|2"),
            Ok(ClientCommand::Move { x: 0, y: 2 })
        );
    }

    #[test]
    fn test_parse_move_rejects_missing_or_negative_arguments() {
        assert_eq!(parse("##MOVE|1"), Err(ProtocolError::BadMove));
        assert_eq!(parse("##MOVE|"), Err(ProtocolError::BadMove));
        assert_eq!(parse("##MOVE|-1|0"), Err(ProtocolError::BadMove));
        assert_eq!(parse("##MOVE|a|b"), Err(ProtocolError::BadMove));
    }

    #[test]
    fn test_parse_reconnect_requires_name_and_session() {
        assert_eq!(
            parse("##RECONNECT|alice|00ff00ff00ff00ff"),
            Ok(ClientCommand::Reconnect {
                name: "alice".to_string(),
                session: "00ff00ff00ff00ff".to_string(),
            })
        );
        assert_eq!(
            parse("##RECONNECT|alice"),
            Err(ProtocolError::BadReconnect)
        );
        assert_eq!(
            parse("##RECONNECT|alice|"),
            Err(ProtocolError::BadReconnect)
        );
    }

    #[test]
    fn test_parse_joinroom_id() {
        assert_eq!(
            parse("##JOINROOM|12"),
            Ok(ClientCommand::JoinRoom { id: RoomId(12) })
        );
        assert_eq!(parse("##JOINROOM|abc"), Err(ProtocolError::BadRoomId));
    }

    #[test]
    fn test_parse_replay_votes() {
        assert_eq!(
            parse("##REPLAY|YES"),
            Ok(ClientCommand::Replay { accept: true })
        );
        assert_eq!(
            parse("##REPLAY|NO"),
            Ok(ClientCommand::Replay { accept: false })
        );
        assert!(matches!(
            parse("##REPLAY|MAYBE"),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_prefix() {
        assert_eq!(parse("LIST|"), Err(ProtocolError::MissingPrefix));
        assert_eq!(parse("#LIST|"), Err(ProtocolError::MissingPrefix));
    }

    #[test]
    fn test_parse_rejects_unknown_tag() {
        assert_eq!(
            parse("##FROBNICATE|now"),
            Err(ProtocolError::UnknownCommand("FROBNICATE".to_string()))
        );
    }

    #[test]
    fn test_parse_tags_are_case_sensitive() {
        assert!(matches!(
            parse("##join|alice"),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_parse_rejects_overlong_line() {
        let line = format!("##JOIN|{}", "x".repeat(MAX_LINE_BYTES));
        assert_eq!(parse(&line), Err(ProtocolError::LineTooLong));
    }

    #[test]
    fn test_parse_accepts_line_at_the_limit() {
        // `##JOIN|` is 7 bytes; pad the name so the line is exactly 512.
        let line = format!("##JOIN|{}", "x".repeat(MAX_LINE_BYTES - 7));
        assert!(parse(&line).is_ok());
    }
}
