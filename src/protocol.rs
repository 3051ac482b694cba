//! Rendezvous wire protocol.
//!
//! Two layers: the outer envelope spoken with the rendezvous server
//! (register + peer-addressed signal routing) and the inner peer-to-peer
//! signal carried opaquely in `Signal.payload` (offer/answer/decline).
//!
//! Version gate: an inner signal with a different `version` is fatal.
//! Wrong-room or unparseable signals are logged and ignored; they belong
//! to another run, not to this session.

use serde::{Deserialize, Serialize};

use crate::integrity::ChannelProfile;

/// Current inner-signal version. Reject anything else.
pub const PROTOCOL_VERSION: u32 = 1;

// ── Server envelope ─────────────────────────────────────────

/// Messages this process sends to the rendezvous server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Claim a session id. The server refuses duplicates.
    Register { session_id: String },
    /// Route an opaque payload to another registered session.
    Signal {
        to: String,
        payload: serde_json::Value,
    },
}

/// Messages the rendezvous server sends to this process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Registration accepted.
    Registered { session_id: String },
    /// A payload routed from another session.
    Signal {
        from: String,
        payload: serde_json::Value,
    },
    /// A previously seen session disconnected.
    PeerGone { session_id: String },
    Error { message: String },
}

// ── Handshake bundle ────────────────────────────────────────

/// Local description plus all gathered ICE candidates, exchanged as one
/// unit (no trickle).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HandshakeBundle {
    pub description: SdpInfo,
    pub candidates: Vec<CandidateInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SdpInfo {
    pub sdp_type: String,
    pub sdp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CandidateInfo {
    pub candidate: String,
    pub mid: String,
}

// ── Peer signal ─────────────────────────────────────────────

/// Inner signal exchanged between the two peers of one session.
///
/// `room` is the host's session id on every variant so receivers can
/// discard strays from unrelated runs. The offer declares the channel
/// profile the dialer requested; the accepting side validates it before
/// any hand-off.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeerSignal {
    Offer {
        version: u32,
        room: String,
        channel: ChannelProfile,
        bundle: HandshakeBundle,
    },
    Answer {
        version: u32,
        room: String,
        bundle: HandshakeBundle,
    },
    /// The session already has its peer; the join attempt is refused.
    Decline {
        version: u32,
        room: String,
        reason: String,
    },
}

impl PeerSignal {
    pub fn version(&self) -> u32 {
        match self {
            PeerSignal::Offer { version, .. }
            | PeerSignal::Answer { version, .. }
            | PeerSignal::Decline { version, .. } => *version,
        }
    }

    pub fn room(&self) -> &str {
        match self {
            PeerSignal::Offer { room, .. }
            | PeerSignal::Answer { room, .. }
            | PeerSignal::Decline { room, .. } => room,
        }
    }
}

// ── Encode / decode helpers ─────────────────────────────────

pub fn encode_client_message(msg: &ClientMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_peer_signal(signal: &PeerSignal) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(signal)
}

pub fn parse_peer_signal(payload: serde_json::Value) -> Result<PeerSignal, serde_json::Error> {
    serde_json::from_value(payload)
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> HandshakeBundle {
        HandshakeBundle {
            description: SdpInfo {
                sdp_type: "offer".to_string(),
                sdp: "v=0\r\ntest sdp".to_string(),
            },
            candidates: vec![CandidateInfo {
                candidate: "candidate:1 1 UDP 2130706431 192.168.1.1 12345 typ host".to_string(),
                mid: "0".to_string(),
            }],
        }
    }

    #[test]
    fn register_wire_format() {
        let msg = ClientMessage::Register {
            session_id: "abc123".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_client_message(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "register");
        assert_eq!(json["session_id"], "abc123");
    }

    #[test]
    fn server_message_roundtrip() {
        let msg = ServerMessage::Signal {
            from: "abc123".to_string(),
            payload: serde_json::json!({"kind": "decline"}),
        };
        let text = serde_json::to_string(&msg).unwrap();
        let back = parse_server_message(&text).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn server_error_parses() {
        let msg =
            parse_server_message(r#"{"type":"error","message":"session id taken"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                message: "session id taken".to_string()
            }
        );
    }

    #[test]
    fn offer_signal_carries_channel_profile() {
        let signal = PeerSignal::Offer {
            version: PROTOCOL_VERSION,
            room: "abc123".to_string(),
            channel: ChannelProfile::RELIABLE_ORDERED,
            bundle: sample_bundle(),
        };
        let value = encode_peer_signal(&signal).unwrap();
        assert_eq!(value["kind"], "offer");
        assert_eq!(value["channel"]["ordered"], true);
        assert!(value["channel"]["max_packet_life_time"].is_null());

        let back = parse_peer_signal(value).unwrap();
        assert_eq!(back, signal);
    }

    #[test]
    fn answer_signal_roundtrip() {
        let signal = PeerSignal::Answer {
            version: PROTOCOL_VERSION,
            room: "abc123".to_string(),
            bundle: sample_bundle(),
        };
        let back = parse_peer_signal(encode_peer_signal(&signal).unwrap()).unwrap();
        assert_eq!(back, signal);
        assert_eq!(back.room(), "abc123");
        assert_eq!(back.version(), PROTOCOL_VERSION);
    }

    #[test]
    fn decline_signal_roundtrip() {
        let signal = PeerSignal::Decline {
            version: PROTOCOL_VERSION,
            room: "abc123".to_string(),
            reason: "session already has a peer".to_string(),
        };
        let back = parse_peer_signal(encode_peer_signal(&signal).unwrap()).unwrap();
        assert_eq!(back, signal);
    }

    #[test]
    fn unknown_signal_kind_is_a_parse_error() {
        let payload = serde_json::json!({"kind": "lobby_chat", "version": 1, "room": "x"});
        assert!(parse_peer_signal(payload).is_err());
    }
}
