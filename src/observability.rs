//! Logging setup and in-process counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,wxvoice=debug,tower_http=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (e.g. from tests) is not an error worth failing over
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Counters reported by the health endpoint
#[derive(Debug, Default)]
pub struct Metrics {
    handshakes_accepted: AtomicU64,
    handshakes_rejected: AtomicU64,
    messages_handled: AtomicU64,
    assets_queued: AtomicU64,
    assets_stored: AtomicU64,
    assets_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handshake_accepted(&self) {
        self.handshakes_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "handshakes_accepted", "Metric incremented");
    }

    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "handshakes_rejected", "Metric incremented");
    }

    pub fn message_handled(&self) {
        self.messages_handled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "messages_handled", "Metric incremented");
    }

    pub fn asset_queued(&self) {
        self.assets_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asset_stored(&self) {
        self.assets_stored.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "assets_stored", "Metric incremented");
    }

    pub fn asset_failed(&self) {
        self.assets_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "assets_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handshakes_accepted: self.handshakes_accepted.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            assets_queued: self.assets_queued.load(Ordering::Relaxed),
            assets_stored: self.assets_stored.load(Ordering::Relaxed),
            assets_failed: self.assets_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub handshakes_accepted: u64,
    pub handshakes_rejected: u64,
    pub messages_handled: u64,
    pub assets_queued: u64,
    pub assets_stored: u64,
    pub assets_failed: u64,
}
