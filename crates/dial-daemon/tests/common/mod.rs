#![allow(dead_code)]

//! Shared fixtures for the integration suites.

use std::sync::Arc;

use async_trait::async_trait;
use dial_core::model::{Facet, Station, SuggestionDraft};
use dial_core::session::SessionManager;
use dial_core::state::StateManager;
use dial_core::Result;
use dial_daemon::directory::{Directory, StationFilter, StationSource};
use dial_daemon::favorites::FavoritesStore;
use dial_daemon::http::{self, AppState};
use dial_daemon::interactions::Interactions;
use dial_daemon::notify::Notifier;
use dial_daemon::player::{AudioSink, PlayerSession};
use dial_daemon::suggest::SuggestionStore;
use dial_daemon::{bus, db};

/// External directory serving a fixed list, so listings run without the
/// network.
pub struct StaticSource {
    pub stations: Vec<Station>,
}

#[async_trait]
impl StationSource for StaticSource {
    async fn stations(&self, _filter: StationFilter) -> Result<Vec<Station>> {
        Ok(self.stations.clone())
    }
    async fn station_by_id(&self, id: &str) -> Result<Option<Station>> {
        Ok(self.stations.iter().find(|s| s.id == id).cloned())
    }
    async fn countries(&self) -> Result<Vec<Facet>> {
        Ok(vec![])
    }
    async fn languages(&self) -> Result<Vec<Facet>> {
        Ok(vec![])
    }
    async fn tags(&self) -> Result<Vec<Facet>> {
        Ok(vec![])
    }
    async fn top_voted(&self, _limit: u32) -> Result<Vec<Station>> {
        Ok(self.stations.clone())
    }
    async fn top_clicked(&self, _limit: u32) -> Result<Vec<Station>> {
        Ok(self.stations.clone())
    }
    async fn register_click(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

pub fn external_station(name: &str) -> Station {
    Station {
        id: format!("uuid-{}", name.to_lowercase()),
        name: name.to_string(),
        url: format!("http://{}.example/stream", name.to_lowercase()),
        country: "Germany".to_string(),
        ..Station::default()
    }
}

pub fn draft() -> SuggestionDraft {
    SuggestionDraft {
        name: "Radio Okapi".to_string(),
        stream_url: "http://stream.okapi.example/live".to_string(),
        website: "http://okapi.example".to_string(),
        logo_url: String::new(),
        description: "News and music across the country".to_string(),
        contact_email: "studio@okapi.example".to_string(),
        contact_phone: "+243 000 0000".to_string(),
        submitter_email: "listener@example.com".to_string(),
        country: "DR Congo".to_string(),
        tags: vec!["news".to_string(), "talk".to_string()],
        language: "french".to_string(),
    }
}

/// Audio output that accepts everything and produces no sound.
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn load(&self, _url: &str, _volume: f32) -> anyhow::Result<()> {
        Ok(())
    }
    async fn set_paused(&self, _paused: bool) -> anyhow::Result<()> {
        Ok(())
    }
    async fn set_volume(&self, _volume: f32) -> anyhow::Result<()> {
        Ok(())
    }
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A full daemon wired onto an ephemeral port, with the external
/// directory replaced by a static station list and the audio output by
/// [`NullSink`].
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn login(&self, user_id: &str, admin: bool) {
        let resp = self
            .client
            .put(self.url("/api/session"))
            .json(&serde_json::json!({ "user_id": user_id, "admin": admin }))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
}

pub async fn spawn_app(stations: Vec<Station>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::open_in_memory().await.unwrap();
    let bus = bus::channel();
    let sessions = SessionManager::new();

    let state_manager = StateManager::new(dir.path().join("state.json"), 0.7);
    let player = Arc::new(PlayerSession::new(
        state_manager,
        Box::new(NullSink),
        bus.clone(),
    ));

    let suggestions = SuggestionStore::new(pool.clone(), Notifier::disabled());
    let directory = Arc::new(Directory::new(
        Box::new(StaticSource { stations }),
        suggestions.clone(),
    ));
    let favorites = Arc::new(FavoritesStore::new(
        pool.clone(),
        dir.path().join("favorites.json"),
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

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, http::router(state)).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}
