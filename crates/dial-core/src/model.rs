use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A playable radio source plus its directory metadata.
///
/// `id` is stable per source: the external directory's uuid, or the
/// suggestion row id for stations that entered through the approval
/// workflow. The two id spaces are never reconciled; merged listings
/// de-duplicate by name only.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Stream URL after the directory resolved playlists and redirects.
    #[serde(default)]
    pub url_resolved: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub favicon: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub votes: u32,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub bitrate: u32,
    /// Result of the directory's last reachability probe.
    #[serde(default)]
    pub last_check_ok: bool,
    #[serde(default)]
    pub last_check_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub click_count: u64,
}

impl Station {
    /// The URL handed to the audio output. Prefers the resolved stream,
    /// falling back to the submitted one.
    pub fn stream_url(&self) -> &str {
        if self.url_resolved.is_empty() {
            &self.url
        } else {
            &self.url_resolved
        }
    }
}

/// One entry of a directory facet list (country, language or tag) with its
/// station count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Facet {
    pub name: String,
    pub station_count: usize,
}

/// Workflow state of a submitted suggestion. Rows only ever change status;
/// there is no physical deletion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SuggestionStatus::Pending),
            "approved" => Some(SuggestionStatus::Approved),
            "rejected" => Some(SuggestionStatus::Rejected),
            _ => None,
        }
    }
}

/// Submitter-entered fields of a station suggestion, before any workflow
/// state is attached. `website` and `logo_url` are the only optional ones.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SuggestionDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stream_url: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub submitter_email: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub language: String,
}

/// A user-submitted candidate station plus its workflow fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    pub website: String,
    pub logo_url: String,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub submitter_email: String,
    pub country: String,
    pub tags: Vec<String>,
    pub language: String,
    pub status: SuggestionStatus,
    pub sponsored: bool,
    pub votes: i64,
    pub slug: String,
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    /// Approved suggestions are served through the public directory as
    /// ordinary stations, keyed by their row id.
    pub fn to_station(&self) -> Station {
        Station {
            id: self.id.clone(),
            name: self.name.clone(),
            url: self.stream_url.clone(),
            url_resolved: self.stream_url.clone(),
            homepage: self.website.clone(),
            favicon: self.logo_url.clone(),
            tags: self.tags.clone(),
            country: self.country.clone(),
            language: self.language.clone(),
            votes: self.votes.max(0) as u32,
            ..Station::default()
        }
    }
}

/// A user holds at most one reaction per station at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// A threaded text comment on a station, owned by its author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub station_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral comment broadcast to everyone currently listening to the
/// station. `dedication` names who the message or song is for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveComment {
    pub id: String,
    pub station_id: String,
    pub user_id: String,
    pub body: String,
    #[serde(default)]
    pub dedication: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_suggestion() -> Suggestion {
        Suggestion {
            id: "sug-1".to_string(),
            name: "Radio Okapi".to_string(),
            stream_url: "http://stream.okapi.cd/live".to_string(),
            website: "http://okapi.cd".to_string(),
            logo_url: String::new(),
            description: "News and music".to_string(),
            contact_email: "contact@okapi.cd".to_string(),
            contact_phone: "+243 000".to_string(),
            submitter_email: "fan@example.com".to_string(),
            country: "DR Congo".to_string(),
            tags: vec!["news".to_string(), "talk".to_string()],
            language: "french".to_string(),
            status: SuggestionStatus::Approved,
            sponsored: true,
            votes: 3,
            slug: "radio-okapi".to_string(),
            submitted_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stream_url_prefers_resolved() {
        let station = Station {
            url: "http://a/stream".to_string(),
            url_resolved: "http://a/resolved".to_string(),
            ..Station::default()
        };
        assert_eq!(station.stream_url(), "http://a/resolved");
    }

    #[test]
    fn test_stream_url_falls_back() {
        let station = Station {
            url: "http://a/stream".to_string(),
            ..Station::default()
        };
        assert_eq!(station.stream_url(), "http://a/stream");
    }

    #[test]
    fn test_suggestion_to_station_keeps_identity() {
        let station = sample_suggestion().to_station();
        assert_eq!(station.id, "sug-1");
        assert_eq!(station.name, "Radio Okapi");
        assert_eq!(station.stream_url(), "http://stream.okapi.cd/live");
        assert_eq!(station.tags, vec!["news", "talk"]);
        assert_eq!(station.votes, 3);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SuggestionStatus::Pending,
            SuggestionStatus::Approved,
            SuggestionStatus::Rejected,
        ] {
            assert_eq!(SuggestionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SuggestionStatus::parse("deleted"), None);
    }

    #[test]
    fn test_reaction_kind_roundtrip() {
        assert_eq!(ReactionKind::parse("like"), Some(ReactionKind::Like));
        assert_eq!(ReactionKind::parse("dislike"), Some(ReactionKind::Dislike));
        assert_eq!(ReactionKind::parse("meh"), None);
    }
}
