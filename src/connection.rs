//! Connection handle for the single peer-to-peer data channel.
//!
//! Owned by the session bootstrap until hand-off, then exclusively by the
//! external simulation. Lifecycle events from the transport arrive on an
//! mpsc channel; traffic counters are shared atomics so diagnostics can
//! sample them without touching the connection itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::integrity::ChannelProfile;

// ── Transport seam ──────────────────────────────────────────

/// Outbound half of a data channel. The inbound half is the event
/// receiver owned by [`Connection`]. Closing is dropping.
pub trait Transport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("data channel is closed")]
    Closed,

    #[error("data channel send failed: {0}")]
    Send(String),
}

// ── Lifecycle events ────────────────────────────────────────

/// Events surfaced by the transport after the channel opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(Vec<u8>),
    Closed,
    Error(String),
}

// ── Transport stats ─────────────────────────────────────────

/// Shared traffic counters, written by the transport callbacks and the
/// send path, read by diagnostics. Never authoritative for correctness.
#[derive(Debug)]
pub struct TransportStats {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    transport_errors: AtomicU64,
    opened_at: Instant,
}

impl Default for TransportStats {
    fn default() -> Self {
        TransportStats {
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            opened_at: Instant::now(),
        }
    }
}

impl TransportStats {
    /// Fresh counters, shared between the transport and diagnostics.
    pub fn shared() -> Arc<TransportStats> {
        Arc::new(TransportStats::default())
    }

    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time view for display purposes.
    pub fn sample(&self) -> StatsSample {
        StatsSample {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            uptime: self.opened_at.elapsed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSample {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub transport_errors: u64,
    pub uptime: Duration,
}

// ── Connection ──────────────────────────────────────────────

/// Bidirectional byte-stream channel to exactly one remote peer.
pub struct Connection {
    label: String,
    remote: String,
    profile: ChannelProfile,
    transport: Box<dyn Transport>,
    events: Receiver<ChannelEvent>,
    stats: Arc<TransportStats>,
}

impl Connection {
    /// Assemble a connection from its parts. Normally called by the
    /// signaling layer once the channel has opened.
    pub fn new(
        label: impl Into<String>,
        remote: impl Into<String>,
        profile: ChannelProfile,
        transport: Box<dyn Transport>,
        events: Receiver<ChannelEvent>,
        stats: Arc<TransportStats>,
    ) -> Self {
        Self {
            label: label.into(),
            remote: remote.into(),
            profile,
            transport,
            events,
            stats,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Session id of the remote peer.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn profile(&self) -> ChannelProfile {
        self.profile
    }

    /// Read-only stats handle for diagnostics.
    pub fn stats(&self) -> Arc<TransportStats> {
        self.stats.clone()
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.transport.send(payload)?;
        self.stats.record_sent(payload.len());
        Ok(())
    }

    /// Next lifecycle event, waiting up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChannelEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Next lifecycle event if one is already queued.
    pub fn try_recv(&self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("label", &self.label)
            .field("remote", &self.remote)
            .field("profile", &self.profile)
            .finish()
    }
}

// ── In-memory pair ──────────────────────────────────────────

/// Loopback transport: sends land in the peer's event queue and are
/// accounted in the peer's receive counters.
struct MemoryTransport {
    peer_events: Sender<ChannelEvent>,
    peer_stats: Arc<TransportStats>,
}

impl Transport for MemoryTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.peer_events
            .send(ChannelEvent::Message(payload.to_vec()))
            .map_err(|_| TransportError::Closed)?;
        self.peer_stats.record_received(payload.len());
        Ok(())
    }
}

impl Connection {
    /// Two cross-wired in-memory connections with the given profile.
    ///
    /// Used by tests and by local single-machine sessions; no network is
    /// involved, but the ownership and accounting contracts are identical
    /// to the WebRTC-backed connection.
    pub fn pair(label: &str, profile: ChannelProfile) -> (Connection, Connection) {
        let (a_tx, a_rx) = std::sync::mpsc::channel();
        let (b_tx, b_rx) = std::sync::mpsc::channel();
        let a_stats = TransportStats::shared();
        let b_stats = TransportStats::shared();

        let a = Connection::new(
            label,
            "peer-b",
            profile,
            Box::new(MemoryTransport {
                peer_events: b_tx,
                peer_stats: b_stats.clone(),
            }),
            a_rx,
            a_stats.clone(),
        );
        let b = Connection::new(
            label,
            "peer-a",
            profile,
            Box::new(MemoryTransport {
                peer_events: a_tx,
                peer_stats: a_stats,
            }),
            b_rx,
            b_stats,
        );
        (a, b)
    }
}

// ── Tests ───────────────────────────────────────────────────
