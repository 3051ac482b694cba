//! Signaling collaborator: peer discovery and channel establishment.
//!
//! The bootstrap consumes signaling through the [`Signaling`] trait:
//! open an identity once, then either dial a room or accept the single
//! expected peer. [`RendezvousSignaling`] is the production impl: a
//! blocking WebSocket client against a rendezvous server for the
//! offer/answer exchange, libdatachannel for the peer connection itself.
//!
//! Every blocking phase runs under an explicit deadline. Expiry surfaces
//! as a signaling error; nothing here hangs indefinitely. There is no
//! retry and no fallback path; a failed handshake is fatal for the
//! bootstrap attempt.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use datachannel::{
    ConnectionState, DataChannelHandler, DataChannelInfo, GatheringState, IceCandidate,
    PeerConnectionHandler, RtcConfig, RtcDataChannel, RtcPeerConnection, SdpType,
    SessionDescription,
};
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use tracing::{info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::connection::{ChannelEvent, Connection, Transport, TransportError, TransportStats};
use crate::integrity::{self, ChannelProfile};
use crate::protocol::{
    encode_client_message, encode_peer_signal, parse_peer_signal, parse_server_message,
    CandidateInfo, ClientMessage, HandshakeBundle, PeerSignal, SdpInfo, ServerMessage,
    PROTOCOL_VERSION,
};

// ── Constants ───────────────────────────────────────────────

/// Length of a generated session id.
const SESSION_ID_LEN: usize = 12;

/// Quiet period granted to straggling ICE candidates between deadline
/// checks while gathering.
const CANDIDATE_POLL: Duration = Duration::from_millis(200);

// ── Errors ──────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("rendezvous server unreachable at {url}: {detail}")]
    Unreachable { url: String, detail: String },

    #[error("phase timeout expired while {0}")]
    Timeout(&'static str),

    #[error("signaling protocol violation: {0}")]
    Protocol(String),

    #[error("rendezvous server rejected the request: {0}")]
    Rejected(String),

    #[error("unsupported signal version {got} (expected {want})")]
    VersionMismatch { got: u32, want: u32 },

    #[error("join attempt declined by remote peer: {0}")]
    Declined(String),

    #[error("transport failure during handshake: {0}")]
    Transport(String),
}

// ── Signaling seam ──────────────────────────────────────────

/// Out-of-band session discovery and channel establishment.
///
/// The bootstrap drives exactly one of `dial`/`accept_one` per session,
/// after a single successful `open`.
pub trait Signaling {
    /// Open the signaling identity. Returns this process's session id.
    fn open(&mut self) -> Result<String, SignalingError>;

    /// Join the session advertised as `room` with a single data channel
    /// of the given profile. Client path.
    fn dial(&mut self, room: &str, profile: ChannelProfile) -> Result<Connection, SignalingError>;

    /// Wait for the single expected inbound connection. Host path.
    /// Additional join attempts observed during the wait are logged and
    /// declined, never silently dropped.
    fn accept_one(&mut self) -> Result<Connection, SignalingError>;
}

// ── DataChannel / PeerConnection handlers ───────────────────

/// Bridges libdatachannel callbacks onto mpsc channels and the shared
/// traffic counters. Receive accounting happens here, before the event
/// is queued.
pub struct DcHandler {
    open_tx: Sender<()>,
    event_tx: Sender<ChannelEvent>,
    stats: Arc<TransportStats>,
}

impl DataChannelHandler for DcHandler {
    fn on_open(&mut self) {
        let _ = self.open_tx.send(());
        let _ = self.event_tx.send(ChannelEvent::Open);
    }

    fn on_closed(&mut self) {
        let _ = self.event_tx.send(ChannelEvent::Closed);
    }

    fn on_error(&mut self, err: &str) {
        self.stats.record_error();
        let _ = self.event_tx.send(ChannelEvent::Error(err.to_string()));
    }

    fn on_message(&mut self, msg: &[u8]) {
        self.stats.record_received(msg.len());
        let _ = self.event_tx.send(ChannelEvent::Message(msg.to_vec()));
    }

    fn on_buffered_amount_low(&mut self) {}

    fn on_available(&mut self) {}
}

struct PcHandler {
    desc_tx: Sender<SessionDescription>,
    cand_tx: Sender<IceCandidate>,
    gather_tx: Sender<GatheringState>,
    dc_open_tx: Sender<()>,
    dc_event_tx: Sender<ChannelEvent>,
    incoming_dc_tx: Sender<Box<RtcDataChannel<DcHandler>>>,
    stats: Arc<TransportStats>,
}

impl PeerConnectionHandler for PcHandler {
    type DCH = DcHandler;

    fn data_channel_handler(&mut self, _info: DataChannelInfo) -> Self::DCH {
        DcHandler {
            open_tx: self.dc_open_tx.clone(),
            event_tx: self.dc_event_tx.clone(),
            stats: self.stats.clone(),
        }
    }

    fn on_description(&mut self, sess_desc: SessionDescription) {
        let _ = self.desc_tx.send(sess_desc);
    }

    fn on_candidate(&mut self, cand: IceCandidate) {
        let _ = self.cand_tx.send(cand);
    }

    fn on_connection_state_change(&mut self, state: ConnectionState) {
        info!("[pc] connection state: {:?}", state);
    }

    fn on_gathering_state_change(&mut self, state: GatheringState) {
        let _ = self.gather_tx.send(state);
    }

    fn on_data_channel(&mut self, dc: Box<RtcDataChannel<Self::DCH>>) {
        let _ = self.incoming_dc_tx.send(dc);
    }
}

/// Receiver/sender ends of the handler bridges for one peer connection.
struct PeerWires {
    desc_rx: Receiver<SessionDescription>,
    cand_rx: Receiver<IceCandidate>,
    gather_rx: Receiver<GatheringState>,
    dc_open_tx: Sender<()>,
    dc_open_rx: Receiver<()>,
    dc_event_tx: Sender<ChannelEvent>,
    dc_event_rx: Receiver<ChannelEvent>,
    incoming_dc_rx: Receiver<Box<RtcDataChannel<DcHandler>>>,
}

fn create_peer(
    stats: Arc<TransportStats>,
) -> Result<(Box<RtcPeerConnection<PcHandler>>, PeerWires), SignalingError> {
    let (desc_tx, desc_rx) = mpsc::channel();
    let (cand_tx, cand_rx) = mpsc::channel();
    let (gather_tx, gather_rx) = mpsc::channel();
    let (dc_open_tx, dc_open_rx) = mpsc::channel();
    let (dc_event_tx, dc_event_rx) = mpsc::channel();
    let (incoming_dc_tx, incoming_dc_rx) = mpsc::channel();

    let handler = PcHandler {
        desc_tx,
        cand_tx,
        gather_tx,
        dc_open_tx: dc_open_tx.clone(),
        dc_event_tx: dc_event_tx.clone(),
        incoming_dc_tx,
        stats,
    };

    // ICE server selection is the rendezvous deployment's concern, not
    // this core's; an empty list gathers host candidates only.
    let config = RtcConfig::new::<&str>(&[]);
    let pc = RtcPeerConnection::new(&config, handler)
        .map_err(|e| SignalingError::Transport(e.to_string()))?;

    Ok((
        pc,
        PeerWires {
            desc_rx,
            cand_rx,
            gather_rx,
            dc_open_tx,
            dc_open_rx,
            dc_event_tx,
            dc_event_rx,
            incoming_dc_rx,
        },
    ))
}

// ── WebRTC-backed transport ─────────────────────────────────

/// Keeps the peer connection alive for as long as the channel handle is;
/// dropping the transport tears both down.
struct DcTransport {
    dc: Box<RtcDataChannel<DcHandler>>,
    _pc: Box<RtcPeerConnection<PcHandler>>,
}

impl Transport for DcTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.dc
            .send(payload)
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

// ── SDP conversions ─────────────────────────────────────────

fn desc_to_info(desc: &SessionDescription) -> SdpInfo {
    let type_str = match desc.sdp_type {
        SdpType::Offer => "offer",
        SdpType::Answer => "answer",
        SdpType::Pranswer => "pranswer",
        SdpType::Rollback => "rollback",
    };
    SdpInfo {
        sdp_type: type_str.to_string(),
        sdp: desc.sdp.to_string(),
    }
}

fn info_to_desc(info: &SdpInfo) -> Result<SessionDescription, SignalingError> {
    let sdp_type = match info.sdp_type.to_lowercase().as_str() {
        "offer" => SdpType::Offer,
        "answer" => SdpType::Answer,
        "pranswer" => SdpType::Pranswer,
        "rollback" => SdpType::Rollback,
        other => {
            return Err(SignalingError::Protocol(format!(
                "unknown SDP type: {other}"
            )))
        }
    };
    let sdp = webrtc_sdp::parse_sdp(&info.sdp, false)
        .map_err(|e| SignalingError::Protocol(format!("SDP parse error: {e:?}")))?;
    Ok(SessionDescription { sdp_type, sdp })
}

fn cand_to_info(cand: &IceCandidate) -> CandidateInfo {
    CandidateInfo {
        candidate: cand.candidate.clone(),
        mid: cand.mid.clone(),
    }
}

// ── Bundle collection / application ─────────────────────────

/// Wait for the local description plus all ICE candidates (gathering
/// complete), bundled for a single signaling exchange.
fn collect_local_bundle(
    desc_rx: &Receiver<SessionDescription>,
    cand_rx: &Receiver<IceCandidate>,
    gather_rx: &Receiver<GatheringState>,
    timeout: Duration,
) -> Result<HandshakeBundle, SignalingError> {
    let desc = desc_rx
        .recv_timeout(timeout)
        .map_err(|_| SignalingError::Timeout("waiting for the local description"))?;
    info!("[signal] local description ready");

    let mut candidates = Vec::new();
    let start = Instant::now();
    loop {
        if let Ok(GatheringState::Complete) = gather_rx.try_recv() {
            while let Ok(c) = cand_rx.try_recv() {
                candidates.push(cand_to_info(&c));
            }
            break;
        }
        match cand_rx.recv_timeout(CANDIDATE_POLL) {
            Ok(c) => candidates.push(cand_to_info(&c)),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(SignalingError::Transport(
                    "candidate stream disconnected".to_string(),
                ))
            }
        }
        if start.elapsed() > timeout {
            return Err(SignalingError::Timeout("waiting for ICE gathering"));
        }
    }
    info!("[signal] gathered {} ICE candidate(s)", candidates.len());

    Ok(HandshakeBundle {
        description: desc_to_info(&desc),
        candidates,
    })
}

/// Apply a remote bundle to the local peer connection.
fn apply_remote_bundle(
    pc: &mut RtcPeerConnection<PcHandler>,
    bundle: &HandshakeBundle,
) -> Result<(), SignalingError> {
    let desc = info_to_desc(&bundle.description)?;
    pc.set_remote_description(&desc)
        .map_err(|e| SignalingError::Transport(e.to_string()))?;
    info!("[signal] remote description applied");

    for c in &bundle.candidates {
        let cand = IceCandidate {
            candidate: c.candidate.clone(),
            mid: c.mid.clone(),
        };
        pc.add_remote_candidate(&cand)
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
    }
    info!(
        "[signal] added {} remote ICE candidate(s)",
        bundle.candidates.len()
    );

    Ok(())
}

// ── Rendezvous signaling ────────────────────────────────────

type WsStream = WebSocket<MaybeTlsStream<std::net::TcpStream>>;

fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Production [`Signaling`] over a rendezvous WebSocket server.
pub struct RendezvousSignaling {
    url: String,
    phase_timeout: Duration,
    channel_label: String,
    ws: Option<WsStream>,
    session_id: Option<String>,
}

impl RendezvousSignaling {
    pub fn new(
        url: impl Into<String>,
        phase_timeout: Duration,
        channel_label: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            phase_timeout,
            channel_label: channel_label.into(),
            ws: None,
            session_id: None,
        }
    }

    fn ws(&mut self) -> Result<&mut WsStream, SignalingError> {
        self.ws
            .as_mut()
            .ok_or_else(|| SignalingError::Protocol("signaling identity not open".to_string()))
    }

    fn send_signal(&mut self, to: &str, signal: &PeerSignal) -> Result<(), SignalingError> {
        let payload =
            encode_peer_signal(signal).map_err(|e| SignalingError::Protocol(e.to_string()))?;
        let msg = ClientMessage::Signal {
            to: to.to_string(),
            payload,
        };
        send_client_message(self.ws()?, &msg)
    }

    /// Next routed peer signal, with the version gate applied. Unparseable
    /// payloads are logged and skipped; a server error is fatal.
    fn recv_signal(
        &mut self,
        deadline: Instant,
        phase: &'static str,
    ) -> Result<(String, PeerSignal), SignalingError> {
        loop {
            let msg = recv_server_message(self.ws()?, deadline, phase)?;
            match msg {
                ServerMessage::Signal { from, payload } => {
                    let signal = match parse_peer_signal(payload) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[signal] ignoring unparseable payload from '{}': {}", from, e);
                            continue;
                        }
                    };
                    if signal.version() != PROTOCOL_VERSION {
                        return Err(SignalingError::VersionMismatch {
                            got: signal.version(),
                            want: PROTOCOL_VERSION,
                        });
                    }
                    return Ok((from, signal));
                }
                ServerMessage::PeerGone { session_id } => {
                    info!("[signal] peer gone: '{}'", session_id);
                }
                ServerMessage::Registered { .. } => {}
                ServerMessage::Error { message } => {
                    return Err(SignalingError::Rejected(message));
                }
            }
        }
    }

    /// Non-blocking-ish variant used while the host waits for its channel
    /// to open: bounded by `window`, never fatal on bad payloads.
    fn try_recv_signal(
        &mut self,
        window: Duration,
    ) -> Result<Option<(String, PeerSignal)>, SignalingError> {
        let deadline = Instant::now() + window;
        let msg = match recv_server_message(self.ws()?, deadline, "pumping late signals") {
            Ok(m) => m,
            Err(SignalingError::Timeout(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match msg {
            ServerMessage::Signal { from, payload } => match parse_peer_signal(payload) {
                Ok(signal) if signal.version() == PROTOCOL_VERSION => Ok(Some((from, signal))),
                Ok(signal) => {
                    warn!(
                        "[signal] ignoring late signal from '{}' with version {}",
                        from,
                        signal.version()
                    );
                    Ok(None)
                }
                Err(e) => {
                    warn!("[signal] ignoring unparseable late payload from '{}': {}", from, e);
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }
}

impl Signaling for RendezvousSignaling {
    fn open(&mut self) -> Result<String, SignalingError> {
        let session_id = generate_session_id();
        info!("[signal] connecting to {}", self.url);

        let (mut ws, _response) =
            tungstenite::connect(self.url.as_str()).map_err(|e| SignalingError::Unreachable {
                url: self.url.clone(),
                detail: e.to_string(),
            })?;

        send_client_message(
            &mut ws,
            &ClientMessage::Register {
                session_id: session_id.clone(),
            },
        )?;

        let deadline = Instant::now() + self.phase_timeout;
        loop {
            match recv_server_message(&mut ws, deadline, "registering the session id")? {
                ServerMessage::Registered {
                    session_id: confirmed,
                } => {
                    if confirmed != session_id {
                        return Err(SignalingError::Protocol(format!(
                            "registered as '{confirmed}', requested '{session_id}'"
                        )));
                    }
                    break;
                }
                ServerMessage::Error { message } => {
                    return Err(SignalingError::Rejected(message));
                }
                other => {
                    info!("[signal] ignoring {:?} before registration", other);
                }
            }
        }

        info!("[signal] registered as '{}'", session_id);
        self.ws = Some(ws);
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    fn dial(&mut self, room: &str, profile: ChannelProfile) -> Result<Connection, SignalingError> {
        // Fail-closed: the channel creation path below always produces a
        // reliable ordered stream, so any other request is a caller bug.
        if integrity::validate(profile).is_err() {
            return Err(SignalingError::Protocol(
                "gameplay channels must be ordered and fully reliable".to_string(),
            ));
        }
        if self.session_id.is_none() {
            return Err(SignalingError::Protocol(
                "dial before the signaling identity opened".to_string(),
            ));
        }

        let deadline = Instant::now() + self.phase_timeout;
        let stats = TransportStats::shared();
        let (mut pc, wires) = create_peer(stats.clone())?;
        let PeerWires {
            desc_rx,
            cand_rx,
            gather_rx,
            dc_open_tx,
            dc_open_rx,
            dc_event_tx,
            dc_event_rx,
            incoming_dc_rx: _,
        } = wires;

        // The joiner originates the channel; creation triggers offer SDP
        // generation and ICE gathering.
        let dc_handler = DcHandler {
            open_tx: dc_open_tx,
            event_tx: dc_event_tx,
            stats: stats.clone(),
        };
        let dc = pc
            .create_data_channel(&self.channel_label, dc_handler)
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        info!("[signal] data channel '{}' created", self.channel_label);

        let bundle = collect_local_bundle(&desc_rx, &cand_rx, &gather_rx, self.phase_timeout)?;
        self.send_signal(
            room,
            &PeerSignal::Offer {
                version: PROTOCOL_VERSION,
                room: room.to_string(),
                channel: profile,
                bundle,
            },
        )?;
        info!("[signal] offer sent to '{}'", room);

        let answer_bundle = loop {
            let (from, signal) = self.recv_signal(deadline, "waiting for the host answer")?;
            if from != room {
                info!(
                    "[signal] ignoring signal from '{}' while dialing '{}'",
                    from, room
                );
                continue;
            }
            match signal {
                PeerSignal::Answer {
                    room: answer_room,
                    bundle,
                    ..
                } if answer_room == room => break bundle,
                PeerSignal::Decline { reason, .. } => {
                    return Err(SignalingError::Declined(reason))
                }
                other => {
                    info!(
                        "[signal] ignoring unexpected signal while dialing: {:?}",
                        other
                    );
                }
            }
        };

        apply_remote_bundle(&mut pc, &answer_bundle)?;

        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(SignalingError::Timeout("waiting for the data channel to open"))?;
        dc_open_rx
            .recv_timeout(remaining)
            .map_err(|_| SignalingError::Timeout("waiting for the data channel to open"))?;
        info!("[signal] data channel open");

        Ok(Connection::new(
            self.channel_label.clone(),
            room,
            profile,
            Box::new(DcTransport { dc, _pc: pc }),
            dc_event_rx,
            stats,
        ))
    }

    fn accept_one(&mut self) -> Result<Connection, SignalingError> {
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| {
                SignalingError::Protocol("accept before the signaling identity opened".to_string())
            })?;
        let deadline = Instant::now() + self.phase_timeout;

        // First valid offer addressed to this session wins.
        let (peer, profile, offer_bundle) = loop {
            let (from, signal) = self.recv_signal(deadline, "waiting for a peer offer")?;
            match signal {
                PeerSignal::Offer {
                    room,
                    channel,
                    bundle,
                    ..
                } => {
                    if room != session_id {
                        info!(
                            "[signal] ignoring offer for room '{}' (this session is '{}')",
                            room, session_id
                        );
                        continue;
                    }
                    break (from, channel, bundle);
                }
                other => {
                    info!(
                        "[signal] ignoring signal while waiting for an offer: {:?}",
                        other
                    );
                }
            }
        };
        info!("[signal] offer received from '{}'", peer);

        let stats = TransportStats::shared();
        let (mut pc, wires) = create_peer(stats.clone())?;
        let PeerWires {
            desc_rx,
            cand_rx,
            gather_rx,
            dc_open_tx: _,
            dc_open_rx,
            dc_event_tx: _,
            dc_event_rx,
            incoming_dc_rx,
        } = wires;

        apply_remote_bundle(&mut pc, &offer_bundle)?;
        let answer_bundle =
            collect_local_bundle(&desc_rx, &cand_rx, &gather_rx, self.phase_timeout)?;
        self.send_signal(
            &peer,
            &PeerSignal::Answer {
                version: PROTOCOL_VERSION,
                room: session_id.clone(),
                bundle: answer_bundle,
            },
        )?;
        info!("[signal] answer sent to '{}'", peer);

        // Wait for the incoming channel and its open event, pumping the
        // signaling socket so late joiners get an explicit decline.
        let mut dc: Option<Box<RtcDataChannel<DcHandler>>> = None;
        let mut opened = false;
        let mut pump = true;
        while dc.is_none() || !opened {
            if dc.is_none() {
                if let Ok(d) = incoming_dc_rx.try_recv() {
                    info!("[signal] incoming data channel");
                    dc = Some(d);
                    continue;
                }
            }
            if !opened && dc_open_rx.try_recv().is_ok() {
                info!("[signal] data channel open");
                opened = true;
                continue;
            }
            if Instant::now() >= deadline {
                return Err(SignalingError::Timeout("waiting for the peer channel to open"));
            }
            if !pump {
                std::thread::sleep(CANDIDATE_POLL);
                continue;
            }
            match self.try_recv_signal(CANDIDATE_POLL) {
                Ok(Some((from, PeerSignal::Offer { room, .. }))) if room == session_id => {
                    warn!(
                        "[signal] declining extra join attempt from '{}': session already has a peer",
                        from
                    );
                    let _ = self.send_signal(
                        &from,
                        &PeerSignal::Decline {
                            version: PROTOCOL_VERSION,
                            room: session_id.clone(),
                            reason: "session already has a peer".to_string(),
                        },
                    );
                }
                Ok(Some((from, _))) => {
                    info!("[signal] ignoring late signal from '{}'", from);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "[signal] signaling socket unusable while waiting for channel open: {}",
                        e
                    );
                    pump = false;
                }
            }
        }
        let dc = dc.expect("BUG: accept loop exited without a data channel");

        Ok(Connection::new(
            self.channel_label.clone(),
            peer,
            profile,
            Box::new(DcTransport { dc, _pc: pc }),
            dc_event_rx,
            stats,
        ))
    }
}

impl Drop for RendezvousSignaling {
    fn drop(&mut self) {
        if let Some(id) = &self.session_id {
            info!(
                "[signal] closing signaling identity '{}'; further join attempts will be refused by the rendezvous server",
                id
            );
        }
    }
}

// ── WebSocket helpers ───────────────────────────────────────

fn send_client_message(ws: &mut WsStream, msg: &ClientMessage) -> Result<(), SignalingError> {
    let json = encode_client_message(msg).map_err(|e| SignalingError::Protocol(e.to_string()))?;
    ws.send(Message::Text(json))
        .map_err(|e| SignalingError::Transport(e.to_string()))
}

/// Read the next server message, respecting the deadline. The read
/// timeout on the underlying TCP stream is capped at 5 s per read so the
/// deadline stays responsive.
fn recv_server_message(
    ws: &mut WsStream,
    deadline: Instant,
    phase: &'static str,
) -> Result<ServerMessage, SignalingError> {
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(SignalingError::Timeout(phase))?;

        let read_timeout = remaining.min(Duration::from_secs(5));
        match ws.get_ref() {
            MaybeTlsStream::Plain(tcp) => {
                tcp.set_read_timeout(Some(read_timeout))
                    .map_err(|e| SignalingError::Transport(e.to_string()))?;
            }
            // Fail-closed: no TLS stream variant is compiled in; if one is
            // added, this arm forces an explicit timeout implementation
            // rather than blocking indefinitely on ws.read().
            #[allow(unreachable_patterns)]
            _ => {
                return Err(SignalingError::Transport(
                    "read timeout not supported for this stream type".to_string(),
                ))
            }
        }

        match ws.read() {
            Ok(msg) => {
                if msg.is_ping() || msg.is_pong() {
                    continue;
                }
                let text = msg.into_text().map_err(|e| {
                    SignalingError::Protocol(format!("expected text from server: {e}"))
                })?;
                return parse_server_message(&text)
                    .map_err(|e| SignalingError::Protocol(e.to_string()));
            }
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                if Instant::now() >= deadline {
                    return Err(SignalingError::Timeout(phase));
                }
                continue;
            }
            Err(e) => return Err(SignalingError::Transport(e.to_string())),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_url_safe_and_fixed_length() {
        for _ in 0..32 {
            let id = generate_session_id();
            assert_eq!(id.len(), SESSION_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn session_ids_are_fresh() {
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn unknown_sdp_type_is_a_protocol_error() {
        let info = SdpInfo {
            sdp_type: "mangled".to_string(),
            sdp: "v=0".to_string(),
        };
        let err = info_to_desc(&info).unwrap_err();
        assert!(matches!(err, SignalingError::Protocol(_)));
    }

    #[test]
    fn dial_refuses_degraded_channel_requests() {
        let mut signaling = RendezvousSignaling::new(
            "ws://127.0.0.1:1",
            Duration::from_millis(10),
            "test",
        );
        let degraded = ChannelProfile {
            ordered: true,
            max_packet_life_time: Some(500),
            max_retransmits: None,
        };
        let err = signaling.dial("room", degraded).unwrap_err();
        assert!(matches!(err, SignalingError::Protocol(_)));
    }

    #[test]
    fn dial_before_open_is_a_protocol_error() {
        let mut signaling = RendezvousSignaling::new(
            "ws://127.0.0.1:1",
            Duration::from_millis(10),
            "test",
        );
        let err = signaling
            .dial("room", ChannelProfile::RELIABLE_ORDERED)
            .unwrap_err();
        assert!(matches!(err, SignalingError::Protocol(_)));
    }

    #[test]
    fn accept_before_open_is_a_protocol_error() {
        let mut signaling = RendezvousSignaling::new(
            "ws://127.0.0.1:1",
            Duration::from_millis(10),
            "test",
        );
        let err = signaling.accept_one().unwrap_err();
        assert!(matches!(err, SignalingError::Protocol(_)));
    }
}
