//! Daemon-wide event bus.
//!
//! Every state change, favorites change and user-visible notice goes out
//! on one `tokio::sync::broadcast` channel. SSE handlers subscribe and
//! forward; no receivers is fine (the send result is ignored).

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Messages published on the daemon-wide channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// Player state changed; clients refetch `/api/state`.
    StateUpdated,
    /// The favorite set for some scope changed. Deliberately payload-free;
    /// readers re-derive the set from the store.
    FavoritesChanged,
    /// A user-visible notice from the playback session or a service.
    Notice { severity: Severity, message: String },
}

pub type Bus = broadcast::Sender<BusEvent>;

pub fn channel() -> Bus {
    let (tx, _) = broadcast::channel(256);
    tx
}

/// Publish a notice and mirror it into the log.
pub fn notice(bus: &Bus, severity: Severity, message: impl Into<String>) {
    let message = message.into();
    match severity {
        Severity::Warning | Severity::Error => warn!("{}", message),
        _ => info!("{}", message),
    }
    let _ = bus.send(BusEvent::Notice { severity, message });
}
