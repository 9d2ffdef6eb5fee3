//! Suggestion / approval workflow.
//!
//! Visitors submit candidate stations; rows start out `pending` and only
//! an administrator moves them to `approved` (public) or `rejected`
//! (never shown). Votes rank pending suggestions, one per user per row,
//! enforced by the store's unique index.

use chrono::Utc;
use dial_core::model::{Suggestion, SuggestionDraft, SuggestionStatus};
use dial_core::session::Session;
use dial_core::slug::slugify;
use dial_core::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::notify::Notifier;

#[derive(Clone)]
pub struct SuggestionStore {
    pool: SqlitePool,
    notifier: Notifier,
}

impl SuggestionStore {
    pub fn new(pool: SqlitePool, notifier: Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Validate and persist a submission as `pending`, then alert the
    /// administrator. Validation runs before the insert and before the
    /// notification; an invalid draft touches neither.
    pub async fn submit(&self, session: &Session, draft: SuggestionDraft) -> Result<Suggestion> {
        validate(&draft)?;

        let suggestion = Suggestion {
            id: Uuid::new_v4().to_string(),
            slug: slugify(&draft.name),
            name: draft.name,
            stream_url: draft.stream_url,
            website: draft.website,
            logo_url: draft.logo_url,
            description: draft.description,
            contact_email: draft.contact_email,
            contact_phone: draft.contact_phone,
            submitter_email: draft.submitter_email,
            country: draft.country,
            tags: draft.tags,
            language: draft.language,
            status: SuggestionStatus::Pending,
            sponsored: false,
            votes: 0,
            submitted_by: session.user_id().map(str::to_string),
            created_at: Utc::now(),
        };

        let tags_json = serde_json::to_string(&suggestion.tags)
            .map_err(|e| Error::InvalidInput(format!("unencodable tags: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO suggestions
                (id, name, stream_url, website, logo_url, description,
                 contact_email, contact_phone, submitter_email, country, tags,
                 language, status, sponsored, votes, slug, submitted_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&suggestion.id)
        .bind(&suggestion.name)
        .bind(&suggestion.stream_url)
        .bind(&suggestion.website)
        .bind(&suggestion.logo_url)
        .bind(&suggestion.description)
        .bind(&suggestion.contact_email)
        .bind(&suggestion.contact_phone)
        .bind(&suggestion.submitter_email)
        .bind(&suggestion.country)
        .bind(&tags_json)
        .bind(&suggestion.language)
        .bind(suggestion.status.as_str())
        .bind(suggestion.sponsored)
        .bind(suggestion.votes)
        .bind(&suggestion.slug)
        .bind(&suggestion.submitted_by)
        .bind(suggestion.created_at)
        .execute(&self.pool)
        .await?;

        self.notifier.notify_new_suggestion(&suggestion);
        Ok(suggestion)
    }

    /// Pending rows, newest first. Administrator only.
    pub async fn pending(&self, session: &Session) -> Result<Vec<Suggestion>> {
        session.require_admin()?;
        let rows = sqlx::query(
            "SELECT * FROM suggestions WHERE status = 'pending' ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(suggestion_from_row).collect()
    }

    /// Pending → approved (and sponsored); the row becomes visible
    /// through the public directory merge.
    pub async fn approve(&self, session: &Session, id: &str) -> Result<()> {
        session.require_admin()?;
        let updated = sqlx::query(
            "UPDATE suggestions SET status = 'approved', sponsored = 1
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("no pending suggestion {}", id)));
        }
        Ok(())
    }

    /// Pending → rejected; no further visibility anywhere.
    pub async fn reject(&self, session: &Session, id: &str) -> Result<()> {
        session.require_admin()?;
        let updated = sqlx::query(
            "UPDATE suggestions SET status = 'rejected' WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("no pending suggestion {}", id)));
        }
        Ok(())
    }

    /// One vote per user per suggestion. A duplicate surfaces as the
    /// explicit `AlreadyVoted` error rather than silent de-dup.
    pub async fn vote(&self, session: &Session, id: &str) -> Result<()> {
        let user = session.require_user()?;

        let inserted = sqlx::query(
            "INSERT INTO suggestion_votes (suggestion_id, user_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(user)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                sqlx::query("UPDATE suggestions SET votes = votes + 1 WHERE id = ?1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(Error::AlreadyVoted),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(Error::NotFound(format!("no suggestion {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Withdrawing a vote that was never cast is a no-op.
    pub async fn remove_vote(&self, session: &Session, id: &str) -> Result<()> {
        let user = session.require_user()?;

        let removed = sqlx::query(
            "DELETE FROM suggestion_votes WHERE suggestion_id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if removed > 0 {
            sqlx::query("UPDATE suggestions SET votes = votes - 1 WHERE id = ?1 AND votes > 0")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn by_id(&self, id: &str) -> Result<Option<Suggestion>> {
        let row = sqlx::query("SELECT * FROM suggestions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(suggestion_from_row).transpose()
    }

    // ── approved-row queries feeding the directory merge ──────────────────────

    pub async fn approved_by_id(&self, id: &str) -> Result<Option<Suggestion>> {
        let row = sqlx::query("SELECT * FROM suggestions WHERE id = ?1 AND status = 'approved'")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(suggestion_from_row).transpose()
    }

    pub async fn approved_by_country(&self, country: &str) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query(
            "SELECT * FROM suggestions
             WHERE status = 'approved' AND country = ?1 COLLATE NOCASE
             ORDER BY created_at DESC, id DESC",
        )
        .bind(country)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(suggestion_from_row).collect()
    }

    pub async fn approved_by_language(&self, language: &str) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query(
            "SELECT * FROM suggestions
             WHERE status = 'approved' AND language = ?1 COLLATE NOCASE
             ORDER BY created_at DESC, id DESC",
        )
        .bind(language)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(suggestion_from_row).collect()
    }

    /// Array-containment match on the JSON tag list.
    pub async fn approved_by_tag(&self, tag: &str) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query(
            "SELECT * FROM suggestions
             WHERE status = 'approved'
               AND EXISTS (SELECT 1 FROM json_each(suggestions.tags)
                           WHERE lower(json_each.value) = lower(?1))
             ORDER BY created_at DESC, id DESC",
        )
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(suggestion_from_row).collect()
    }

    /// Case-insensitive substring match on the name.
    pub async fn approved_by_name(&self, name: &str) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query(
            "SELECT * FROM suggestions
             WHERE status = 'approved' AND name LIKE '%' || ?1 || '%'
             ORDER BY created_at DESC, id DESC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(suggestion_from_row).collect()
    }
}

fn validate(draft: &SuggestionDraft) -> Result<()> {
    let required = [
        ("name", &draft.name),
        ("stream_url", &draft.stream_url),
        ("description", &draft.description),
        ("contact_email", &draft.contact_email),
        ("contact_phone", &draft.contact_phone),
        ("submitter_email", &draft.submitter_email),
        ("country", &draft.country),
        ("language", &draft.language),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "missing required field: {}",
                field
            )));
        }
    }
    if draft.tags.iter().all(|t| t.trim().is_empty()) {
        return Err(Error::InvalidInput(
            "missing required field: tags".to_string(),
        ));
    }
    Ok(())
}

fn suggestion_from_row(row: &SqliteRow) -> Result<Suggestion> {
    let status_raw: String = row.get("status");
    let status = SuggestionStatus::parse(&status_raw)
        .ok_or_else(|| Error::Config(format!("corrupt suggestion status: {}", status_raw)))?;

    let tags_json: String = row.get("tags");
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    Ok(Suggestion {
        id: row.get("id"),
        name: row.get("name"),
        stream_url: row.get("stream_url"),
        website: row.get("website"),
        logo_url: row.get("logo_url"),
        description: row.get("description"),
        contact_email: row.get("contact_email"),
        contact_phone: row.get("contact_phone"),
        submitter_email: row.get("submitter_email"),
        country: row.get("country"),
        tags,
        language: row.get("language"),
        status,
        sponsored: row.get::<i64, _>("sponsored") != 0,
        votes: row.get("votes"),
        slug: row.get("slug"),
        submitted_by: row.get("submitted_by"),
        created_at: row.get("created_at"),
    })
}
