//! Connection diagnostics: periodic, non-authoritative stats sampling.
//!
//! A background sampler reads the connection's shared counters once per
//! second and renders a display-ready report for an external UI layer.
//! Purely observational: sampling problems are logged and swallowed, and
//! nothing here can block or alter the bootstrap or gameplay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::connection::{StatsSample, TransportStats};
use crate::integrity::ChannelProfile;

// ── Constants ───────────────────────────────────────────────

/// Fixed sampling interval.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

// ── Rendering ───────────────────────────────────────────────

/// Render one report: a header line per stat category, indented
/// key/value lines beneath.
fn render_report(label: &str, profile: ChannelProfile, sample: &StatsSample) -> String {
    let mut out = String::new();

    out.push_str("channel\n");
    out.push_str(&format!("  label: {}\n", label));
    out.push_str(&format!("  ordered: {}\n", profile.is_ordered()));
    out.push_str(&format!("  reliable: {}\n", profile.is_reliable()));

    out.push_str("traffic\n");
    out.push_str(&format!("  messages_sent: {}\n", sample.messages_sent));
    out.push_str(&format!("  messages_received: {}\n", sample.messages_received));
    out.push_str(&format!("  bytes_sent: {}\n", sample.bytes_sent));
    out.push_str(&format!("  bytes_received: {}\n", sample.bytes_received));

    out.push_str("session\n");
    out.push_str(&format!("  uptime_secs: {}\n", sample.uptime.as_secs()));
    out.push_str(&format!("  transport_errors: {}\n", sample.transport_errors));

    out
}

// ── Diagnostics ─────────────────────────────────────────────

/// Handle to a running sampler. Dropping it stops the sampler thread.
pub struct ConnectionDiagnostics {
    report: Arc<Mutex<String>>,
    stop: Arc<AtomicBool>,
    sampler: Option<thread::JoinHandle<()>>,
}

impl ConnectionDiagnostics {
    /// Start sampling the given stats handle every [`SAMPLE_INTERVAL`].
    ///
    /// Holds only the read-only counters; the connection itself is never
    /// touched, mutated, or closed from here.
    pub fn start(
        stats: Arc<TransportStats>,
        profile: ChannelProfile,
        label: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let report = Arc::new(Mutex::new(String::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_report = report.clone();
        let thread_stop = stop.clone();
        let sampler = thread::spawn(move || {
            info!("[diag] sampler started for channel '{}'", label);
            while !thread_stop.load(Ordering::Relaxed) {
                let sample = stats.sample();
                let rendered = render_report(&label, profile, &sample);
                match thread_report.lock() {
                    Ok(mut slot) => *slot = rendered,
                    // A poisoned slot means a reader panicked mid-copy;
                    // diagnostics are advisory, so log and keep sampling.
                    Err(e) => warn!("[diag] report slot unavailable: {}", e),
                }
                thread::sleep(SAMPLE_INTERVAL);
            }
            info!("[diag] sampler stopped");
        });

        Self {
            report,
            stop,
            sampler: Some(sampler),
        }
    }

    /// Most recently rendered report; empty until the first sample lands.
    pub fn latest(&self) -> String {
        match self.report.lock() {
            Ok(slot) => slot.clone(),
            Err(e) => {
                warn!("[diag] report slot unavailable: {}", e);
                String::new()
            }
        }
    }

    /// Stop the sampler and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.sampler.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ConnectionDiagnostics {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sample_with_traffic() -> StatsSample {
        StatsSample {
            bytes_sent: 120,
            bytes_received: 48,
            messages_sent: 3,
            messages_received: 2,
            transport_errors: 0,
            uptime: Duration::from_secs(7),
        }
    }

    #[test]
    fn report_has_one_section_per_category() {
        let text = render_report(
            "tether",
            ChannelProfile::RELIABLE_ORDERED,
            &sample_with_traffic(),
        );
        let headers: Vec<&str> = text
            .lines()
            .filter(|l| !l.starts_with("  "))
            .collect();
        assert_eq!(headers, vec!["channel", "traffic", "session"]);
    }

    #[test]
    fn report_lists_key_value_lines_under_each_section() {
        let text = render_report(
            "tether",
            ChannelProfile::RELIABLE_ORDERED,
            &sample_with_traffic(),
        );
        assert!(text.contains("  label: tether\n"));
        assert!(text.contains("  ordered: true\n"));
        assert!(text.contains("  reliable: true\n"));
        assert!(text.contains("  bytes_sent: 120\n"));
        assert!(text.contains("  messages_received: 2\n"));
        assert!(text.contains("  uptime_secs: 7\n"));
    }

    #[test]
    fn sampler_publishes_a_report_and_stops() {
        let stats = TransportStats::shared();
        stats.record_sent(64);

        let mut diag =
            ConnectionDiagnostics::start(stats, ChannelProfile::RELIABLE_ORDERED, "tether");

        // First sample is rendered promptly; poll briefly rather than a
        // full interval.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let report = diag.latest();
            if report.contains("bytes_sent: 64") {
                break;
            }
            assert!(Instant::now() < deadline, "sampler never published");
            thread::sleep(Duration::from_millis(10));
        }

        diag.stop();
    }
}
