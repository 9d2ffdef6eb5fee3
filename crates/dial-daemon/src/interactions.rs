//! Reactions, comments and live comments, each scoped to a signed-in user.
//!
//! Live comments additionally fan out to everyone currently viewing the
//! same station through a broadcast channel keyed by station id; a
//! subscription ends when its receiver is dropped.

use chrono::Utc;
use dial_core::model::{Comment, LiveComment, ReactionCounts, ReactionKind};
use dial_core::session::Session;
use dial_core::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct Interactions {
    pool: SqlitePool,
    live: LiveHub,
}

impl Interactions {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            live: LiveHub::new(),
        }
    }

    // ── reactions ─────────────────────────────────────────────────────────────

    /// Record a like/dislike. At most one reaction row exists per
    /// (station, user); switching kind is remove-then-add by the caller.
    /// The two steps are not atomic; the unique index is what keeps
    /// racing adds from ever producing a second row.
    pub async fn add_reaction(
        &self,
        session: &Session,
        station_id: &str,
        kind: ReactionKind,
    ) -> Result<()> {
        let user = session.require_user()?;

        let inserted = sqlx::query(
            "INSERT INTO reactions (station_id, user_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(station_id)
        .bind(user)
        .bind(kind.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(Error::Conflict(
                "a reaction for this station is already recorded; remove it first".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Removing a reaction that was never recorded is a no-op.
    pub async fn remove_reaction(&self, session: &Session, station_id: &str) -> Result<()> {
        let user = session.require_user()?;
        sqlx::query("DELETE FROM reactions WHERE station_id = ?1 AND user_id = ?2")
            .bind(station_id)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reaction_counts(&self, station_id: &str) -> Result<ReactionCounts> {
        let rows = sqlx::query(
            "SELECT kind, COUNT(*) AS n FROM reactions WHERE station_id = ?1 GROUP BY kind",
        )
        .bind(station_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ReactionCounts::default();
        for row in rows {
            let kind: String = row.get("kind");
            let n: i64 = row.get("n");
            match ReactionKind::parse(&kind) {
                Some(ReactionKind::Like) => counts.likes = n,
                Some(ReactionKind::Dislike) => counts.dislikes = n,
                None => {}
            }
        }
        Ok(counts)
    }

    pub async fn user_reaction(
        &self,
        session: &Session,
        station_id: &str,
    ) -> Result<Option<ReactionKind>> {
        let user = session.require_user()?;
        let row = sqlx::query("SELECT kind FROM reactions WHERE station_id = ?1 AND user_id = ?2")
            .bind(station_id)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| ReactionKind::parse(&r.get::<String, _>("kind"))))
    }

    // ── comments ──────────────────────────────────────────────────────────────

    pub async fn add_comment(
        &self,
        session: &Session,
        station_id: &str,
        body: &str,
    ) -> Result<Comment> {
        let user = session.require_user()?;
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("comment text is required".to_string()));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            station_id: station_id.to_string(),
            user_id: user.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO comments (id, station_id, user_id, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&comment.id)
        .bind(&comment.station_id)
        .bind(&comment.user_id)
        .bind(&comment.body)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(comment)
    }

    /// Newest first.
    pub async fn comments(&self, station_id: &str) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT * FROM comments WHERE station_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(station_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Deletable only by the authoring user.
    pub async fn delete_comment(&self, session: &Session, comment_id: &str) -> Result<()> {
        let user = session.require_user()?;

        let row = sqlx::query("SELECT user_id FROM comments WHERE id = ?1")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("no comment {}", comment_id)));
        };
        let owner: String = row.get("user_id");
        if owner != user {
            return Err(Error::Unauthorized(
                "only the author can delete a comment".to_string(),
            ));
        }

        sqlx::query("DELETE FROM comments WHERE id = ?1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── live comments ─────────────────────────────────────────────────────────

    /// Persist a live comment and push it to every current viewer of the
    /// station.
    pub async fn add_live_comment(
        &self,
        session: &Session,
        station_id: &str,
        body: &str,
        dedication: Option<String>,
    ) -> Result<LiveComment> {
        let user = session.require_user()?;
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("comment text is required".to_string()));
        }

        let comment = LiveComment {
            id: Uuid::new_v4().to_string(),
            station_id: station_id.to_string(),
            user_id: user.to_string(),
            body: body.to_string(),
            dedication,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO live_comments (id, station_id, user_id, body, dedication, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&comment.id)
        .bind(&comment.station_id)
        .bind(&comment.user_id)
        .bind(&comment.body)
        .bind(&comment.dedication)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        self.live.publish(&comment);
        Ok(comment)
    }

    /// Newest first.
    pub async fn live_comments(&self, station_id: &str) -> Result<Vec<LiveComment>> {
        let rows = sqlx::query(
            "SELECT * FROM live_comments WHERE station_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(station_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(live_comment_from_row).collect())
    }

    pub async fn delete_live_comment(&self, session: &Session, comment_id: &str) -> Result<()> {
        let user = session.require_user()?;

        let row = sqlx::query("SELECT user_id FROM live_comments WHERE id = ?1")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("no live comment {}", comment_id)));
        };
        let owner: String = row.get("user_id");
        if owner != user {
            return Err(Error::Unauthorized(
                "only the author can delete a comment".to_string(),
            ));
        }

        sqlx::query("DELETE FROM live_comments WHERE id = ?1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Join the station's live channel. Drop the receiver to leave; the
    /// channel itself is pruned once the last viewer is gone.
    pub fn subscribe_live(&self, station_id: &str) -> broadcast::Receiver<LiveComment> {
        self.live.subscribe(station_id)
    }
}

fn comment_from_row(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        station_id: row.get("station_id"),
        user_id: row.get("user_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

fn live_comment_from_row(row: &SqliteRow) -> LiveComment {
    LiveComment {
        id: row.get("id"),
        station_id: row.get("station_id"),
        user_id: row.get("user_id"),
        body: row.get("body"),
        dedication: row.get("dedication"),
        created_at: row.get("created_at"),
    }
}

// ── live hub ──────────────────────────────────────────────────────────────────

struct LiveHub {
    channels: Mutex<HashMap<String, broadcast::Sender<LiveComment>>>,
}

impl LiveHub {
    fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<LiveComment>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribe(&self, station_id: &str) -> broadcast::Receiver<LiveComment> {
        let mut channels = self.lock();
        // Drop channels whose last viewer left.
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(station_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe()
    }

    fn publish(&self, comment: &LiveComment) {
        let mut channels = self.lock();
        if let Some(tx) = channels.get(&comment.station_id) {
            if tx.send(comment.clone()).is_err() {
                channels.remove(&comment.station_id);
            }
        }
    }
}
