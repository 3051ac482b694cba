//! Session bootstrap: from a location string to a validated connection
//! handed to the game.
//!
//! The state machine is strictly sequential and fail-closed: any
//! negotiation, signaling, or integrity error moves to `Failed`, the
//! in-progress connection is dropped, and the error is returned. There is
//! no auto-retry; retry policy is an operator concern, and a rejoin is a
//! fresh process.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::connection::Connection;
use crate::diagnostics::ConnectionDiagnostics;
use crate::integrity::{self, ChannelIntegrityError, ChannelProfile};
use crate::negotiate::{self, NegotiationError};
use crate::player::{Player, SessionRole};
use crate::signaling::{RendezvousSignaling, Signaling, SignalingError};

// ── Constants ───────────────────────────────────────────────

/// Deadline for each signaling phase (identity open, dial, accept).
pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default data-channel label.
pub const DEFAULT_CHANNEL_LABEL: &str = "tether";

// ── Config ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Rendezvous server the signaling identity registers with.
    pub rendezvous_url: String,
    pub phase_timeout: Duration,
    pub channel_label: String,
    /// Start a stats sampler on the validated connection.
    pub diagnostics: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            rendezvous_url: "ws://127.0.0.1:8090".to_string(),
            phase_timeout: DEFAULT_PHASE_TIMEOUT,
            channel_label: DEFAULT_CHANNEL_LABEL.to_string(),
            diagnostics: true,
        }
    }
}

// ── State machine ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Idle,
    SignalingOpen,
    /// Host: join token published, session joinable.
    Advertising,
    /// Host: waiting for the single expected peer.
    AwaitingPeer,
    /// Client: dialing the advertised session.
    Dialing,
    PeerConnected,
    ChannelValidated,
    HandedOff,
    Failed,
}

impl std::fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BootstrapState::Idle => "idle",
            BootstrapState::SignalingOpen => "signaling-open",
            BootstrapState::Advertising => "advertising",
            BootstrapState::AwaitingPeer => "awaiting-peer",
            BootstrapState::Dialing => "dialing",
            BootstrapState::PeerConnected => "peer-connected",
            BootstrapState::ChannelValidated => "channel-validated",
            BootstrapState::HandedOff => "handed-off",
            BootstrapState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// ── Errors ──────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("role negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("signaling failed: {0}")]
    Signaling(#[from] SignalingError),

    #[error("channel integrity violation: {0}")]
    Integrity(#[from] ChannelIntegrityError),
}

// ── Game seam ───────────────────────────────────────────────

/// Entry points of the external simulation.
///
/// Exactly one of `start_host`/`start_client` is invoked, exactly once,
/// only after the channel passed the integrity gate. Ownership of the
/// connection transfers with the call; the bootstrap never touches it
/// afterward. Neither hook is expected to return promptly: the
/// simulation owns the rest of the process lifetime.
pub trait GameSession {
    /// The shareable join link for this session. Host only, fired while
    /// the session is advertised.
    fn on_join_url(&mut self, url: &str) {
        info!("[bootstrap] join link: {}", url);
    }

    fn start_host(&mut self, players: [Player; 2], connection: Connection);

    fn start_client(&mut self, players: [Player; 2], connection: Connection);
}

// ── Bootstrap ───────────────────────────────────────────────

pub struct SessionBootstrap<S: Signaling> {
    signaling: S,
    config: BootstrapConfig,
    state: BootstrapState,
    role: SessionRole,
    diagnostics: Option<ConnectionDiagnostics>,
}

impl SessionBootstrap<RendezvousSignaling> {
    /// Bootstrap wired to the production rendezvous signaling.
    pub fn connect(config: BootstrapConfig) -> Self {
        let signaling = RendezvousSignaling::new(
            config.rendezvous_url.clone(),
            config.phase_timeout,
            config.channel_label.clone(),
        );
        Self::new(signaling, config)
    }
}

impl<S: Signaling> SessionBootstrap<S> {
    pub fn new(signaling: S, config: BootstrapConfig) -> Self {
        Self {
            signaling,
            config,
            state: BootstrapState::Idle,
            role: SessionRole::Undetermined,
            diagnostics: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Role resolved by negotiation; `Undetermined` until then.
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Stats sampler started on the validated connection, when enabled.
    /// An external UI layer reads reports through it; gameplay never
    /// depends on it.
    pub fn diagnostics(&self) -> Option<&ConnectionDiagnostics> {
        self.diagnostics.as_ref()
    }

    fn set_state(&mut self, next: BootstrapState) {
        info!("[bootstrap] state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Drive the full handshake from `location` to hand-off.
    ///
    /// `location` is the session's addressable location; a
    /// `#room=<sessionId>` fragment makes this process the client.
    pub fn run<G: GameSession>(
        &mut self,
        location: &str,
        game: &mut G,
    ) -> Result<(), BootstrapError> {
        match self.drive(location, game) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_state(BootstrapState::Failed);
                error!("[bootstrap] failed: {}", e);
                Err(e)
            }
        }
    }

    fn drive<G: GameSession>(
        &mut self,
        location: &str,
        game: &mut G,
    ) -> Result<(), BootstrapError> {
        self.set_state(BootstrapState::SignalingOpen);
        let local_id = self.signaling.open()?;

        let negotiated = negotiate::negotiate(location, &local_id)?;
        self.role = negotiated.role;
        info!(
            "[bootstrap] role resolved: {} (session '{}')",
            negotiated.role, negotiated.session_id
        );

        let connection = match negotiated.role {
            SessionRole::Host => {
                self.set_state(BootstrapState::Advertising);
                let url = negotiate::join_url(location, &negotiated.session_id);
                game.on_join_url(&url);

                self.set_state(BootstrapState::AwaitingPeer);
                self.signaling.accept_one()?
            }
            SessionRole::Client => {
                self.set_state(BootstrapState::Dialing);
                self.signaling
                    .dial(&negotiated.session_id, ChannelProfile::RELIABLE_ORDERED)?
            }
            SessionRole::Undetermined => {
                unreachable!("BUG: negotiation always resolves host or client")
            }
        };
        self.set_state(BootstrapState::PeerConnected);

        integrity::validate(connection.profile())?;
        self.set_state(BootstrapState::ChannelValidated);

        if self.config.diagnostics {
            self.diagnostics = Some(ConnectionDiagnostics::start(
                connection.stats(),
                connection.profile(),
                self.config.channel_label.clone(),
            ));
        }

        // Sole externally observable success signal. The hook owns the
        // connection from here and may never return.
        self.set_state(BootstrapState::HandedOff);
        match negotiated.role {
            SessionRole::Host => game.start_host(negotiated.players, connection),
            SessionRole::Client => game.start_client(negotiated.players, connection),
            SessionRole::Undetermined => {
                unreachable!("BUG: negotiation always resolves host or client")
            }
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────
