//! Shared health state for the /health endpoint.
//! Updated by the feed manager, engine, and alert dispatcher.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared health metrics. Scanner components write, the ops API reads.
#[derive(Default)]
pub struct HealthState {
    /// True while the feed is authenticated and streaming.
    pub feed_connected: AtomicBool,
    pub ticks_processed: AtomicU64,
    pub alerts_emitted: AtomicU64,
    /// Findings dropped because the alert channel was full.
    pub alerts_dropped: AtomicU64,
    /// Dispatches the notification channel rejected.
    pub alerts_failed: AtomicU64,
    /// Unix-nanosecond timestamp of the last successful dispatch (0 = none).
    pub last_alert_at_ns: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed_connected(&self, v: bool) {
        self.feed_connected.store(v, Ordering::Relaxed);
    }

    pub fn inc_ticks_processed(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_emitted(&self) {
        self.alerts_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_dropped(&self) {
        self.alerts_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_failed(&self) {
        self.alerts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_alert_sent(&self) {
        let ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.last_alert_at_ns.store(ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            feed_connected: self.feed_connected.load(Ordering::Relaxed),
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            alerts_dropped: self.alerts_dropped.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
            last_alert_at_ns: self.last_alert_at_ns.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HealthSnapshot {
    pub feed_connected: bool,
    pub ticks_processed: u64,
    pub alerts_emitted: u64,
    pub alerts_dropped: u64,
    pub alerts_failed: u64,
    pub last_alert_at_ns: u64,
}
