//! Transport-quality gate for negotiated data channels.
//!
//! Any netcode layered on a session channel assumes messages arrive in the
//! order sent and are never silently dropped. A channel that opened but is
//! unordered or partially reliable is unusable, so validation failure is
//! fatal: no renegotiation, no fallback.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Channel profile ─────────────────────────────────────────

/// Delivery properties of a negotiated data channel.
///
/// A channel is reliable iff both partial-reliability knobs are unset;
/// either one set means messages may be dropped after a time or retry
/// budget, which this core refuses.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelProfile {
    pub ordered: bool,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
}

impl ChannelProfile {
    /// The only profile gameplay may use.
    pub const RELIABLE_ORDERED: ChannelProfile = ChannelProfile {
        ordered: true,
        max_packet_life_time: None,
        max_retransmits: None,
    };

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn is_reliable(&self) -> bool {
        self.max_packet_life_time.is_none() && self.max_retransmits.is_none()
    }
}

impl Default for ChannelProfile {
    fn default() -> Self {
        ChannelProfile::RELIABLE_ORDERED
    }
}

// ── Validation ──────────────────────────────────────────────

/// A negotiated channel that technically opened but cannot carry netcode.
///
/// Distinct from transport errors: this is an environment/programmer
/// error, not a transient fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelIntegrityError {
    #[error("data channel must be ordered")]
    Unordered,

    #[error(
        "data channel must be fully reliable \
         (max_packet_life_time={max_packet_life_time:?}, max_retransmits={max_retransmits:?})"
    )]
    PartiallyReliable {
        max_packet_life_time: Option<u16>,
        max_retransmits: Option<u16>,
    },
}

/// Accept only strictly ordered, fully reliable channels.
pub fn validate(profile: ChannelProfile) -> Result<(), ChannelIntegrityError> {
    if !profile.is_ordered() {
        return Err(ChannelIntegrityError::Unordered);
    }
    if !profile.is_reliable() {
        return Err(ChannelIntegrityError::PartiallyReliable {
            max_packet_life_time: profile.max_packet_life_time,
            max_retransmits: profile.max_retransmits,
        });
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliable_ordered_passes() {
        assert!(validate(ChannelProfile::RELIABLE_ORDERED).is_ok());
        assert!(validate(ChannelProfile::default()).is_ok());
    }

    #[test]
    fn unordered_fails() {
        let profile = ChannelProfile {
            ordered: false,
            ..ChannelProfile::RELIABLE_ORDERED
        };
        assert_eq!(validate(profile), Err(ChannelIntegrityError::Unordered));
    }

    #[test]
    fn packet_lifetime_makes_channel_unusable() {
        let profile = ChannelProfile {
            ordered: true,
            max_packet_life_time: Some(500),
            max_retransmits: None,
        };
        assert_eq!(
            validate(profile),
            Err(ChannelIntegrityError::PartiallyReliable {
                max_packet_life_time: Some(500),
                max_retransmits: None,
            })
        );
    }

    #[test]
    fn retransmit_cap_makes_channel_unusable() {
        let profile = ChannelProfile {
            ordered: true,
            max_packet_life_time: None,
            max_retransmits: Some(3),
        };
        assert!(validate(profile).is_err());
    }

    #[test]
    fn unordered_is_reported_before_reliability() {
        let profile = ChannelProfile {
            ordered: false,
            max_packet_life_time: Some(500),
            max_retransmits: Some(3),
        };
        assert_eq!(validate(profile), Err(ChannelIntegrityError::Unordered));
    }

    #[test]
    fn profile_options_encode_as_null_on_the_wire() {
        let json = serde_json::to_value(ChannelProfile::RELIABLE_ORDERED).unwrap();
        assert_eq!(json["ordered"], true);
        assert!(json["max_packet_life_time"].is_null());
        assert!(json["max_retransmits"].is_null());
    }
}
