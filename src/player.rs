//! Player identities and session role.
//!
//! Exactly two players exist per session. Player 0 is always the session
//! originator (host), player 1 is always the joiner. The roster is built
//! once at role-negotiation time and never changes afterwards.

use serde::{Deserialize, Serialize};

// ── Player ──────────────────────────────────────────────────

/// One of the two participants in a session.
///
/// Invariants:
/// - `id` is 0 or 1; id 0 carries `is_host == true`, id 1 carries
///   `is_host == false`, regardless of which process is local.
/// - Exactly one player in a roster has `is_local == true`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub id: u8,
    pub is_local: bool,
    pub is_host: bool,
}

/// Player id reserved for the session originator.
pub const HOST_PLAYER_ID: u8 = 0;

/// Player id reserved for the session joiner.
pub const CLIENT_PLAYER_ID: u8 = 1;

impl Player {
    pub fn new(id: u8, is_local: bool, is_host: bool) -> Self {
        Self {
            id,
            is_local,
            is_host,
        }
    }
}

// ── Session role ────────────────────────────────────────────

/// Which side of the session this process plays.
///
/// Derived once from the location fragment; `Undetermined` exists only
/// before negotiation has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionRole {
    #[default]
    Undetermined,
    /// Session originator; owns player id 0.
    Host,
    /// Session joiner; owns player id 1.
    Client,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Undetermined => write!(f, "undetermined"),
            SessionRole::Host => write!(f, "host"),
            SessionRole::Client => write!(f, "client"),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_fixed() {
        assert_eq!(HOST_PLAYER_ID, 0);
        assert_eq!(CLIENT_PLAYER_ID, 1);
    }

    #[test]
    fn role_defaults_to_undetermined() {
        assert_eq!(SessionRole::default(), SessionRole::Undetermined);
    }

    #[test]
    fn player_serde_roundtrip() {
        let p = Player::new(0, true, true);
        let json = serde_json::to_string(&p).unwrap();
        let back: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn role_display() {
        assert_eq!(SessionRole::Host.to_string(), "host");
        assert_eq!(SessionRole::Client.to_string(), "client");
    }
}
