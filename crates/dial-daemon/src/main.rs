use std::sync::Arc;

use dial_core::config::Config;
use dial_core::session::SessionManager;
use dial_core::state::StateManager;
use tokio::sync::mpsc;
use tracing::info;

use dial_daemon::directory::{Directory, RadioBrowser};
use dial_daemon::favorites::FavoritesStore;
use dial_daemon::http::{self, AppState};
use dial_daemon::interactions::Interactions;
use dial_daemon::mpv::MpvSink;
use dial_daemon::notify::Notifier;
use dial_daemon::player::PlayerSession;
use dial_daemon::suggest::SuggestionStore;
use dial_daemon::{bus, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,dial_daemon=debug")),
        )
        .init();

    let config = Config::load()?;
    info!("config loaded from {:?}", Config::config_path());

    let pool = db::open(&config.daemon.database_file).await?;
    let bus = bus::channel();
    let sessions = SessionManager::new();

    // Playback session over the mpv output. The event channel carries
    // device-level reports (stream death, pause flips) back into the
    // session.
    let state_manager = StateManager::new(
        config.daemon.state_file.clone(),
        config.playback.default_volume,
    );
    let (audio_tx, audio_rx) = mpsc::channel(64);
    let sink = MpvSink::new(audio_tx);
    let player = Arc::new(PlayerSession::new(state_manager, Box::new(sink), bus.clone()));
    tokio::spawn(Arc::clone(&player).run(audio_rx));

    let notifier = Notifier::new(&config.notify);
    let suggestions = SuggestionStore::new(pool.clone(), notifier);
    let directory = Arc::new(Directory::new(
        Box::new(RadioBrowser::new(&config.directory)),
        suggestions.clone(),
    ));
    let favorites = Arc::new(FavoritesStore::new(
        pool.clone(),
        config.daemon.favorites_file.clone(),
        bus.clone(),
    ));
    let interactions = Arc::new(Interactions::new(pool));

    let state = AppState {
        player,
        directory,
        favorites,
        interactions,
        suggestions,
        sessions,
        bus,
    };

    http::serve(&config.http.bind_address, config.http.port, state).await
}
