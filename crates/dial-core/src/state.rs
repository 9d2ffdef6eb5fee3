use crate::model::Station;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot of the single playback session. `rev` is a monotonically
/// increasing counter incremented on every change; clients can use it to
/// detect missed updates and resync.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerState {
    #[serde(default)]
    pub rev: u64,
    pub current_station: Option<Station>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub volume: f32,
}

/// The slice of player state worth keeping across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    pub volume: f32,
}

/// Single owner of `PlayerState`. Every mutation happens through one of
/// the methods below; nothing else holds the lock.
pub struct StateManager {
    state: Arc<RwLock<PlayerState>>,
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: PathBuf, default_volume: f32) -> Self {
        let volume = Self::load_persistent(&state_file)
            .map(|p| p.volume)
            .unwrap_or(default_volume)
            .clamp(0.0, 1.0);

        let state = PlayerState {
            rev: 1,
            current_station: None,
            is_playing: false,
            is_loading: false,
            volume,
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            state_file,
        }
    }

    pub async fn get_state(&self) -> PlayerState {
        self.state.read().await.clone()
    }

    pub async fn volume(&self) -> f32 {
        self.state.read().await.volume
    }

    /// A new station was selected: it becomes current immediately, with
    /// nothing playing until the load resolves.
    pub async fn begin_loading(&self, station: Station) {
        let mut state = self.state.write().await;
        state.current_station = Some(station);
        state.is_playing = false;
        state.is_loading = true;
        state.rev += 1;
    }

    pub async fn set_playing(&self) {
        let mut state = self.state.write().await;
        state.is_playing = true;
        state.is_loading = false;
        state.rev += 1;
    }

    /// Load or resume failed. The current station stays set so the user
    /// can retry.
    pub async fn set_load_failed(&self) {
        let mut state = self.state.write().await;
        state.is_playing = false;
        state.is_loading = false;
        state.rev += 1;
    }

    pub async fn set_paused(&self, paused: bool) {
        let mut state = self.state.write().await;
        state.is_playing = !paused;
        state.is_loading = false;
        state.rev += 1;
    }

    pub async fn set_stopped(&self) {
        let mut state = self.state.write().await;
        state.current_station = None;
        state.is_playing = false;
        state.is_loading = false;
        state.rev += 1;
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.volume = volume.clamp(0.0, 1.0);
            state.rev += 1;
        }
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        let persistent = {
            let state = self.state.read().await;
            PersistentState {
                volume: state.volume,
            }
        };

        if let Some(parent) = self.state_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&persistent)
            .map_err(|e| crate::Error::Config(format!("failed to serialize state: {}", e)))?;
        tokio::fs::write(&self.state_file, json).await?;
        Ok(())
    }

    fn load_persistent(state_file: &PathBuf) -> Option<PersistentState> {
        let content = std::fs::read_to_string(state_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(persistent) => Some(persistent),
            Err(e) => {
                tracing::warn!("unreadable state file {:?}: {}", state_file, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_state_file() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("dial_state_test_{}.json", id))
    }

    fn station(name: &str) -> Station {
        Station {
            id: format!("id-{}", name),
            name: name.to_string(),
            url: format!("http://{}.example/stream", name),
            ..Station::default()
        }
    }

    #[tokio::test]
    async fn test_initial_state() {
        let manager = StateManager::new(temp_state_file(), 0.7);
        let state = manager.get_state().await;
        assert!(state.current_station.is_none());
        assert!(!state.is_playing);
        assert!(!state.is_loading);
        assert_eq!(state.volume, 0.7);
    }

    #[tokio::test]
    async fn test_loading_then_playing() {
        let manager = StateManager::new(temp_state_file(), 0.7);

        manager.begin_loading(station("one")).await;
        let state = manager.get_state().await;
        assert!(state.is_loading);
        assert!(!state.is_playing);
        assert_eq!(state.current_station.as_ref().unwrap().name, "one");

        manager.set_playing().await;
        let state = manager.get_state().await;
        assert!(state.is_playing);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_failed_load_retains_station() {
        let manager = StateManager::new(temp_state_file(), 0.7);
        manager.begin_loading(station("one")).await;
        manager.set_load_failed().await;

        let state = manager.get_state().await;
        assert!(!state.is_playing);
        assert!(!state.is_loading);
        assert!(state.current_station.is_some());
    }

    #[tokio::test]
    async fn test_stop_clears_station() {
        let manager = StateManager::new(temp_state_file(), 0.7);
        manager.begin_loading(station("one")).await;
        manager.set_playing().await;
        manager.set_stopped().await;

        let state = manager.get_state().await;
        assert!(state.current_station.is_none());
        assert!(!state.is_playing);
    }

    #[tokio::test]
    async fn test_volume_clamped_and_persisted() {
        let path = temp_state_file();

        {
            let manager = StateManager::new(path.clone(), 0.7);
            manager.set_volume(1.4).await.unwrap();
            assert_eq!(manager.volume().await, 1.0);
            manager.set_volume(0.25).await.unwrap();
        }

        let manager = StateManager::new(path.clone(), 0.7);
        assert_eq!(manager.volume().await, 0.25);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_rev_increments() {
        let manager = StateManager::new(temp_state_file(), 0.7);
        let before = manager.get_state().await.rev;
        manager.begin_loading(station("one")).await;
        manager.set_playing().await;
        let after = manager.get_state().await.rev;
        assert!(after >= before + 2);
    }
}
