//! Favorites store.
//!
//! One bookmark list per scope: anonymous sessions keep a JSON array file
//! under the data dir, signed-in users keep rows in the `favorites` table.
//! The scope is selected once per call through the `FavoriteScope`
//! capability interface, and the first authenticated read migrates the
//! local list into the account.

use async_trait::async_trait;
use chrono::Utc;
use dial_core::session::Session;
use dial_core::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::bus::{Bus, BusEvent};

/// Read/write capability over one favorites scope. Adds and removes are
/// idempotent: a duplicate add and a missing remove are both no-ops.
#[async_trait]
trait FavoriteScope: Send + Sync {
    async fn list(&self) -> Result<Vec<String>>;
    async fn add(&self, station_id: &str) -> Result<()>;
    async fn remove(&self, station_id: &str) -> Result<()>;
}

// ── anonymous scope: local JSON file ──────────────────────────────────────────

struct LocalScope {
    path: PathBuf,
}

impl LocalScope {
    async fn read_ids(&self) -> Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!("unreadable local favorites file {:?}: {}", self.path, e);
                Ok(Vec::new())
            }
        }
    }

    async fn write_ids(&self, ids: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(ids)
            .map_err(|e| Error::Config(format!("failed to serialize favorites: {}", e)))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FavoriteScope for LocalScope {
    async fn list(&self) -> Result<Vec<String>> {
        self.read_ids().await
    }

    async fn add(&self, station_id: &str) -> Result<()> {
        let mut ids = self.read_ids().await?;
        if !ids.iter().any(|id| id == station_id) {
            ids.push(station_id.to_string());
            self.write_ids(&ids).await?;
        }
        Ok(())
    }

    async fn remove(&self, station_id: &str) -> Result<()> {
        let mut ids = self.read_ids().await?;
        let before = ids.len();
        ids.retain(|id| id != station_id);
        if ids.len() != before {
            self.write_ids(&ids).await?;
        }
        Ok(())
    }
}

// ── authenticated scope: per-user rows ────────────────────────────────────────

struct RemoteScope {
    pool: SqlitePool,
    user_id: String,
}

#[async_trait]
impl FavoriteScope for RemoteScope {
    async fn list(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT station_id FROM favorites WHERE user_id = ?1 ORDER BY added_at, rowid",
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("station_id")).collect())
    }

    async fn add(&self, station_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO favorites (user_id, station_id, added_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&self.user_id)
        .bind(station_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, station_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = ?1 AND station_id = ?2")
            .bind(&self.user_id)
            .bind(station_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ── store ─────────────────────────────────────────────────────────────────────

pub struct FavoritesStore {
    pool: SqlitePool,
    local_path: PathBuf,
    bus: Bus,
}

impl FavoritesStore {
    pub fn new(pool: SqlitePool, local_path: PathBuf, bus: Bus) -> Self {
        Self {
            pool,
            local_path,
            bus,
        }
    }

    fn local(&self) -> LocalScope {
        LocalScope {
            path: self.local_path.clone(),
        }
    }

    fn scope(&self, session: &Session) -> Box<dyn FavoriteScope> {
        match session.user_id() {
            Some(user) => Box::new(RemoteScope {
                pool: self.pool.clone(),
                user_id: user.to_string(),
            }),
            None => Box::new(self.local()),
        }
    }

    /// The full favorite set for the caller's scope. An authenticated read
    /// first carries any local (anonymous) entries into the user's rows
    /// and clears the local list.
    pub async fn favorites(&self, session: &Session) -> Result<Vec<String>> {
        if session.user_id().is_some() {
            self.migrate_local(session).await?;
        }
        self.scope(session).list().await
    }

    /// Derived from `favorites()` on every call; never cached on its own.
    pub async fn is_favorite(&self, session: &Session, station_id: &str) -> Result<bool> {
        Ok(self
            .favorites(session)
            .await?
            .iter()
            .any(|id| id == station_id))
    }

    pub async fn add(&self, session: &Session, station_id: &str) -> Result<()> {
        self.scope(session).add(station_id).await?;
        let _ = self.bus.send(BusEvent::FavoritesChanged);
        Ok(())
    }

    pub async fn remove(&self, session: &Session, station_id: &str) -> Result<()> {
        self.scope(session).remove(station_id).await?;
        let _ = self.bus.send(BusEvent::FavoritesChanged);
        Ok(())
    }

    /// Not guarded against concurrent invocation: two near-simultaneous
    /// first reads can both run this, and the unique index on
    /// (user_id, station_id) is what makes the second set of inserts
    /// no-ops.
    async fn migrate_local(&self, session: &Session) -> Result<()> {
        let local = self.local();
        let ids = local.read_ids().await?;
        if ids.is_empty() {
            return Ok(());
        }

        let remote = self.scope(session);
        for id in &ids {
            remote.add(id).await?;
        }
        local.clear().await?;

        info!("migrated {} local favorites into the account", ids.len());
        let _ = self.bus.send(BusEvent::FavoritesChanged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bus, db};

    async fn store_in(dir: &tempfile::TempDir) -> FavoritesStore {
        let pool = db::open_in_memory().await.unwrap();
        FavoritesStore::new(pool, dir.path().join("favorites.json"), bus::channel())
    }

    #[tokio::test]
    async fn test_anonymous_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let anon = Session::Anonymous;

        store.add(&anon, "x").await.unwrap();
        store.add(&anon, "x").await.unwrap();
        store.add(&anon, "y").await.unwrap();

        assert_eq!(store.favorites(&anon).await.unwrap(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_anonymous_remove_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let anon = Session::Anonymous;

        store.remove(&anon, "ghost").await.unwrap();
        assert!(store.favorites(&anon).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let user = Session::user("u1");

        store.add(&user, "x").await.unwrap();
        store.add(&user, "x").await.unwrap();

        assert_eq!(store.favorites(&user).await.unwrap(), vec!["x"]);
        assert!(store.is_favorite(&user, "x").await.unwrap());
        assert!(!store.is_favorite(&user, "y").await.unwrap());
    }

    #[tokio::test]
    async fn test_scopes_do_not_bleed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        store.add(&Session::user("u1"), "a").await.unwrap();
        store.add(&Session::user("u2"), "b").await.unwrap();

        assert_eq!(store.favorites(&Session::user("u1")).await.unwrap(), vec!["a"]);
        assert_eq!(store.favorites(&Session::user("u2")).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_changed_signal_fires_on_add_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let mut rx = store.bus.subscribe();

        store.add(&Session::Anonymous, "x").await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), BusEvent::FavoritesChanged));

        store.remove(&Session::Anonymous, "x").await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), BusEvent::FavoritesChanged));
    }

    #[tokio::test]
    async fn test_corrupt_local_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "not json").unwrap();

        let pool = db::open_in_memory().await.unwrap();
        let store = FavoritesStore::new(pool, path, bus::channel());
        assert!(store.favorites(&Session::Anonymous).await.unwrap().is_empty());
    }
}
