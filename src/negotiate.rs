//! Peer role negotiation from the session's addressable location.
//!
//! The join token travels out-of-band as a location fragment:
//! `...#room=<sessionId>`. A present, non-empty `room` key makes this
//! process the client; its absence makes it the host. A malformed or
//! ambiguous token fails negotiation fatally; the operator restarts with
//! a clean location, there is no retry.

use thiserror::Error;

use crate::player::{Player, SessionRole, CLIENT_PLAYER_ID, HOST_PLAYER_ID};

// ── Errors ──────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// The fragment repeats the `room` key.
    #[error("ambiguous location fragment: 'room' appears more than once")]
    AmbiguousRoom,

    /// The room token contains characters a session id never carries.
    #[error("malformed room token '{0}': expected alphanumeric, '-' or '_'")]
    MalformedRoom(String),
}

// ── Negotiated session ──────────────────────────────────────

/// Outcome of role negotiation: the resolved role, the fixed two-player
/// roster, and the session id (locally allocated for the host, the room
/// token for the client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSession {
    pub role: SessionRole,
    pub players: [Player; 2],
    pub session_id: String,
}

// ── Fragment parsing ────────────────────────────────────────

/// Extract the `room` token from a location string, if any.
///
/// The fragment is everything after the first `#`, parsed as `&`-joined
/// `key=value` pairs. Returns `Ok(None)` when no usable token is present
/// (no fragment, no `room` key, or an empty value, all of which mean
/// "host"). Repeated `room` keys are ambiguous and fatal.
pub fn room_token(location: &str) -> Result<Option<String>, NegotiationError> {
    let fragment = match location.split_once('#') {
        Some((_, frag)) => frag,
        None => return Ok(None),
    };

    let mut token: Option<&str> = None;
    for pair in fragment.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some(kv) => kv,
            None => (pair, ""),
        };
        if key != "room" {
            continue;
        }
        if token.is_some() {
            return Err(NegotiationError::AmbiguousRoom);
        }
        token = Some(value);
    }

    match token {
        None => Ok(None),
        Some("") => Ok(None),
        Some(value) => {
            if value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                Ok(Some(value.to_string()))
            } else {
                Err(NegotiationError::MalformedRoom(value.to_string()))
            }
        }
    }
}

// ── Negotiation ─────────────────────────────────────────────

/// Decide host vs client and build the player roster.
///
/// `local_session_id` is the id obtained when the signaling identity
/// opened; it becomes the session id only when this process is the host.
/// Roster ordering is invariant across both roles: index 0 is always the
/// host's player object.
pub fn negotiate(
    location: &str,
    local_session_id: &str,
) -> Result<NegotiatedSession, NegotiationError> {
    match room_token(location)? {
        Some(room) => Ok(NegotiatedSession {
            role: SessionRole::Client,
            players: [
                Player::new(HOST_PLAYER_ID, false, true),
                Player::new(CLIENT_PLAYER_ID, true, false),
            ],
            session_id: room,
        }),
        None => Ok(NegotiatedSession {
            role: SessionRole::Host,
            players: [
                Player::new(HOST_PLAYER_ID, true, true),
                Player::new(CLIENT_PLAYER_ID, false, false),
            ],
            session_id: local_session_id.to_string(),
        }),
    }
}

/// Build the shareable join link for a session: the base location with its
/// fragment (if any) replaced by `#room=<session_id>`.
pub fn join_url(base: &str, session_id: &str) -> String {
    let stripped = match base.split_once('#') {
        Some((head, _)) => head,
        None => base,
    };
    format!("{}#room={}", stripped, session_id)
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_fragment_means_host() {
        let n = negotiate("https://play.example/game", "abc123").unwrap();
        assert_eq!(n.role, SessionRole::Host);
        assert_eq!(n.session_id, "abc123");
    }

    #[test]
    fn room_fragment_means_client() {
        let n = negotiate("https://play.example/game#room=abc123", "local9").unwrap();
        assert_eq!(n.role, SessionRole::Client);
        assert_eq!(n.session_id, "abc123");
    }

    #[test]
    fn client_roster_marks_remote_host_local_joiner() {
        let n = negotiate("https://play.example/#room=abc123", "x").unwrap();
        assert!(n.players[0].is_host);
        assert!(!n.players[0].is_local);
        assert!(n.players[1].is_local);
        assert!(!n.players[1].is_host);
        assert_eq!(n.players[0].id, 0);
        assert_eq!(n.players[1].id, 1);
    }

    #[test]
    fn host_roster_marks_local_host_remote_joiner() {
        let n = negotiate("https://play.example/", "hostid").unwrap();
        assert!(n.players[0].is_host);
        assert!(n.players[0].is_local);
        assert!(!n.players[1].is_local);
        assert!(!n.players[1].is_host);
    }

    #[test]
    fn exactly_one_host_and_no_duplicate_ids() {
        for location in ["https://x/", "https://x/#room=abc"] {
            let n = negotiate(location, "id").unwrap();
            let hosts = n.players.iter().filter(|p| p.is_host).count();
            assert_eq!(hosts, 1, "exactly one host in roster for {location}");
            assert_ne!(n.players[0].id, n.players[1].id);
            let locals = n.players.iter().filter(|p| p.is_local).count();
            assert_eq!(locals, 1, "exactly one local player for {location}");
        }
    }

    #[test]
    fn empty_room_value_means_host() {
        let n = negotiate("https://x/#room=", "id").unwrap();
        assert_eq!(n.role, SessionRole::Host);
    }

    #[test]
    fn other_fragment_keys_are_ignored() {
        let n = negotiate("https://x/#debug=1&speed=2", "id").unwrap();
        assert_eq!(n.role, SessionRole::Host);
        let n = negotiate("https://x/#debug=1&room=abc&speed=2", "id").unwrap();
        assert_eq!(n.role, SessionRole::Client);
        assert_eq!(n.session_id, "abc");
    }

    #[test]
    fn repeated_room_key_is_ambiguous() {
        let err = room_token("https://x/#room=a&room=b").unwrap_err();
        assert_eq!(err, NegotiationError::AmbiguousRoom);
        // Even an identical repeat is refused: the operator's link is broken.
        let err = room_token("https://x/#room=a&room=a").unwrap_err();
        assert_eq!(err, NegotiationError::AmbiguousRoom);
    }

    #[test]
    fn malformed_room_token_is_fatal() {
        let err = room_token("https://x/#room=a b").unwrap_err();
        assert!(matches!(err, NegotiationError::MalformedRoom(_)));
        let err = room_token("https://x/#room=a/b").unwrap_err();
        assert!(matches!(err, NegotiationError::MalformedRoom(_)));
    }

    #[test]
    fn join_url_appends_room_fragment() {
        assert_eq!(
            join_url("https://play.example/game", "abc123"),
            "https://play.example/game#room=abc123"
        );
    }

    #[test]
    fn join_url_replaces_existing_fragment() {
        assert_eq!(
            join_url("https://play.example/game#stale=1", "abc123"),
            "https://play.example/game#room=abc123"
        );
    }
}
