//! Audio playback session: the single owner of "what is playing".
//!
//! `PlayerSession` mediates every transition through one `AudioSink` (the
//! one native audio output this process drives) and publishes the result
//! on the daemon bus. The session never enters an unrecoverable state: a
//! failed load or resume keeps the station selected so the caller can
//! retry, and device-level errors arriving mid-stream only flip
//! `is_playing` off.
//!
//! Implicit state machine:
//!
//! ```text
//!   Idle ── play ──▶ Loading ── ok ──▶ Playing ⇄ Paused
//!    ▲                  │ err                   │
//!    │                  ▼                       │
//!    └── stop ──── Idle (station retained) ◀────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dial_core::model::Station;
use dial_core::state::{PlayerState, StateManager};
use dial_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bus::{self, Bus, BusEvent, Severity};

/// One native audio output.
///
/// `load` resolves once the source is accepted and playback is starting;
/// later device-level failures arrive as [`AudioEvent`]s on the channel
/// the sink was built with.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn load(&self, url: &str, volume: f32) -> anyhow::Result<()>;
    async fn set_paused(&self, paused: bool) -> anyhow::Result<()>;
    async fn set_volume(&self, volume: f32) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Unsolicited reports from the audio output.
#[derive(Debug, Clone)]
pub enum AudioEvent {
    /// The stream ended. `error` carries the output's reason when it died
    /// rather than finished.
    Ended { error: Option<String> },
    /// Pause state changed on the output.
    PauseChanged(bool),
}

pub struct PlayerSession {
    state: StateManager,
    sink: Box<dyn AudioSink>,
    bus: Bus,
    /// Whether the sink currently holds a loaded source. Cleared on stop
    /// and on failure so a resume attempt knows to reload instead.
    source_loaded: AtomicBool,
}

impl PlayerSession {
    pub fn new(state: StateManager, sink: Box<dyn AudioSink>, bus: Bus) -> Self {
        Self {
            state,
            sink,
            bus,
            source_loaded: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> PlayerState {
        self.state.get_state().await
    }

    /// Unconditionally supersede whatever is playing with `station`.
    ///
    /// On failure the station stays current (no rollback, no retry); the
    /// returned error is the caller's failure signal, and a notice has
    /// already been published for the surface.
    pub async fn play_station(&self, station: Station) -> Result<()> {
        info!("playing station: {}", station.name);

        let _ = self.sink.stop().await;
        self.source_loaded.store(false, Ordering::SeqCst);

        self.state.begin_loading(station.clone()).await;
        let _ = self.bus.send(BusEvent::StateUpdated);

        let volume = self.state.volume().await;
        self.start(&station, volume).await
    }

    async fn start(&self, station: &Station, volume: f32) -> Result<()> {
        match self.sink.load(station.stream_url(), volume).await {
            Ok(()) => {
                self.source_loaded.store(true, Ordering::SeqCst);
                self.state.set_playing().await;
                let _ = self.bus.send(BusEvent::StateUpdated);
                bus::notice(
                    &self.bus,
                    Severity::Success,
                    format!("Playing {}", station.name),
                );
                Ok(())
            }
            Err(e) => {
                warn!("failed to start '{}': {}", station.name, e);
                self.state.set_load_failed().await;
                let _ = self.bus.send(BusEvent::StateUpdated);
                bus::notice(
                    &self.bus,
                    Severity::Error,
                    format!("Could not play {}: {}", station.name, e),
                );
                Err(Error::Playback(e.to_string()))
            }
        }
    }

    /// No-op without a station. Pausing always sticks; resuming may fail
    /// and leaves the station in place for another attempt. When the last
    /// load never took, resume runs the full load again.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let state = self.state.get_state().await;
        let Some(station) = state.current_station else {
            return Ok(());
        };

        if state.is_playing {
            if let Err(e) = self.sink.set_paused(true).await {
                warn!("pause failed on the output: {}", e);
            }
            self.state.set_paused(true).await;
            let _ = self.bus.send(BusEvent::StateUpdated);
            return Ok(());
        }

        if !self.source_loaded.load(Ordering::SeqCst) {
            return self.play_station(station).await;
        }

        match self.sink.set_paused(false).await {
            Ok(()) => {
                self.state.set_paused(false).await;
                let _ = self.bus.send(BusEvent::StateUpdated);
                Ok(())
            }
            Err(e) => {
                warn!("resume failed for '{}': {}", station.name, e);
                self.source_loaded.store(false, Ordering::SeqCst);
                self.state.set_load_failed().await;
                let _ = self.bus.send(BusEvent::StateUpdated);
                bus::notice(
                    &self.bus,
                    Severity::Error,
                    format!("Could not resume {}: {}", station.name, e),
                );
                Err(Error::Playback(e.to_string()))
            }
        }
    }

    /// Clamped to [0, 1], applied to the output immediately, state updated
    /// synchronously. A sink that cannot take the volume right now is not
    /// an error; the value is re-applied on the next load.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.state.set_volume(volume).await?;
        let applied = self.state.volume().await;
        if let Err(e) = self.sink.set_volume(applied).await {
            warn!("failed to apply volume to the output: {}", e);
        }
        let _ = self.bus.send(BusEvent::StateUpdated);
        Ok(())
    }

    /// Unconditional halt: output stopped, source released, station
    /// cleared.
    pub async fn stop_playback(&self) -> Result<()> {
        info!("stopping playback");
        if let Err(e) = self.sink.stop().await {
            warn!("audio output stop failed: {}", e);
        }
        self.source_loaded.store(false, Ordering::SeqCst);
        self.state.set_stopped().await;
        let _ = self.bus.send(BusEvent::StateUpdated);
        Ok(())
    }

    /// Feed one unsolicited audio event into the session.
    pub async fn handle_event(&self, event: AudioEvent) {
        match event {
            AudioEvent::Ended { error } => {
                let state = self.state.get_state().await;
                let Some(station) = state.current_station else {
                    // Stop already cleared the session.
                    return;
                };
                self.source_loaded.store(false, Ordering::SeqCst);
                self.state.set_load_failed().await;
                let _ = self.bus.send(BusEvent::StateUpdated);
                match error {
                    Some(reason) => {
                        warn!("stream for '{}' died: {}", station.name, reason);
                        bus::notice(
                            &self.bus,
                            Severity::Error,
                            format!("Playback error on {}: {}", station.name, reason),
                        );
                    }
                    None => {
                        if state.is_playing {
                            bus::notice(
                                &self.bus,
                                Severity::Info,
                                format!("{} stream ended", station.name),
                            );
                        }
                    }
                }
            }
            AudioEvent::PauseChanged(paused) => {
                // Outputs report the current pause value when observation
                // starts; without a loaded source that report is stale.
                if !self.source_loaded.load(Ordering::SeqCst) {
                    return;
                }
                let state = self.state.get_state().await;
                if state.current_station.is_some() && state.is_playing == paused {
                    self.state.set_paused(paused).await;
                    let _ = self.bus.send(BusEvent::StateUpdated);
                }
            }
        }
    }

    /// Drive the session from the sink's event channel until it closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<AudioEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("audio event channel closed");
    }
}
