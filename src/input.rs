//! Per-tick input capture.
//!
//! Device events mutate a single shared raw state (last write wins, no
//! queuing); the simulation polls `capture()` once per tick and gets an
//! immutable snapshot that shares no storage with the raw state. A symbol
//! held across many ticks reads as held on every tick.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

// ── Raw input state ─────────────────────────────────────────

/// Current instantaneous state of all tracked input symbols.
///
/// The only writers are device-event callbacks through [`InputEvents`];
/// the only reader is [`InputCapture::capture`], which copies.
#[derive(Debug, Default)]
struct RawInputState {
    held: Mutex<HashMap<String, bool>>,
}

// ── Event sink ──────────────────────────────────────────────

/// Writer handle given to the host environment's device-event source.
///
/// Cloneable so separate down/up subscriptions can each own one.
#[derive(Debug, Clone)]
pub struct InputEvents {
    raw: Arc<RawInputState>,
}

impl InputEvents {
    /// Record a "symbol activated" event.
    pub fn symbol_down(&self, symbol: &str) {
        let mut held = self.raw.held.lock().expect("BUG: input state poisoned");
        held.insert(symbol.to_string(), true);
    }

    /// Record a "symbol deactivated" event.
    pub fn symbol_up(&self, symbol: &str) {
        let mut held = self.raw.held.lock().expect("BUG: input state poisoned");
        held.insert(symbol.to_string(), false);
    }
}

// ── Capture ─────────────────────────────────────────────────

/// Reader side of the input subsystem.
pub struct InputCapture {
    raw: Arc<RawInputState>,
}

impl InputCapture {
    /// Create the capture/event pair. The returned [`InputEvents`] is the
    /// single writer and must be wired to the device-event source; this
    /// handle is the single reader.
    pub fn start() -> (InputCapture, InputEvents) {
        let raw = Arc::new(RawInputState::default());
        (
            InputCapture { raw: raw.clone() },
            InputEvents { raw },
        )
    }

    /// Snapshot the currently held symbols.
    ///
    /// The result owns its storage: later device events never alter a
    /// previously captured snapshot. A capture before any event fired
    /// yields an empty snapshot, which is valid.
    pub fn capture(&self) -> InputSnapshot {
        let held = self.raw.held.lock().expect("BUG: input state poisoned");
        let pressed = held
            .iter()
            .filter(|(_, down)| **down)
            .map(|(sym, _)| (sym.clone(), true))
            .collect();
        InputSnapshot { pressed }
    }
}

// ── Snapshot ────────────────────────────────────────────────

/// Immutable per-tick input vector.
///
/// Contains only symbols that were held at capture time; released or
/// never-seen symbols are absent, not present-with-false. Equality is
/// mapping equality.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSnapshot {
    pressed: BTreeMap<String, bool>,
}

impl InputSnapshot {
    /// Whether `symbol` was held at capture time.
    pub fn is_held(&self, symbol: &str) -> bool {
        self.pressed.get(symbol).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    /// Held symbols in deterministic (sorted) order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.pressed.keys().map(String::as_str)
    }
}

// ── Pointer projection ──────────────────────────────────────

/// On-screen placement of the game surface, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Stateless mapping from device coordinates into the game's logical
/// canvas space. Not part of the per-tick contract; richer input readers
/// built on the same raw-state pattern use it to project pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub rect: SurfaceRect,
}

impl ViewTransform {
    /// Logical-pixels-per-device-pixel scale on each axis.
    pub fn scale(&self) -> (f64, f64) {
        (
            self.canvas_width / self.rect.width,
            self.canvas_height / self.rect.height,
        )
    }

    /// Project a device-space position into canvas coordinates.
    pub fn project(&self, client_x: f64, client_y: f64) -> (f64, f64) {
        let (sx, sy) = self.scale();
        (
            (client_x - self.rect.left) * sx,
            (client_y - self.rect.top) * sy,
        )
    }
}

// ── Tests ───────────────────────────────────────────────────
