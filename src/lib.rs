//! Tether: two-peer realtime game session bootstrap.
//!
//! Establishes a totally ordered, lossless byte stream between exactly
//! two peers and hands it to an externally implemented simulation. The
//! pieces: role negotiation from the location fragment, rendezvous
//! signaling to a validated WebRTC DataChannel, a hard ordered+reliable
//! integrity gate, per-tick input capture, and advisory connection
//! diagnostics.
//!
//! The simulation itself (rollback, prediction, state sync) is out of
//! scope; it plugs in through [`bootstrap::GameSession`] and polls
//! [`input::InputCapture::capture`] once per tick.

pub mod bootstrap;
pub mod connection;
pub mod diagnostics;
pub mod input;
pub mod integrity;
pub mod negotiate;
pub mod player;
pub mod protocol;
pub mod signaling;

pub use bootstrap::{
    BootstrapConfig, BootstrapError, BootstrapState, GameSession, SessionBootstrap,
};
pub use connection::{ChannelEvent, Connection, Transport, TransportError, TransportStats};
pub use diagnostics::ConnectionDiagnostics;
pub use input::{InputCapture, InputEvents, InputSnapshot};
pub use integrity::{ChannelIntegrityError, ChannelProfile};
pub use negotiate::{negotiate, NegotiatedSession, NegotiationError};
pub use player::{Player, SessionRole};
pub use signaling::{RendezvousSignaling, Signaling, SignalingError};
