//! Station directory client.
//!
//! Listings come from two places: the external radio-browser compatible
//! API and the approved rows of the suggestion workflow. The external
//! query is authoritative (its failure propagates), while a failing
//! internal lookup degrades to external-only results.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dial_core::config::DirectoryConfig;
use dial_core::model::{Facet, Station};
use dial_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::suggest::SuggestionStore;

/// Which single criterion a listing query filters on.
#[derive(Debug, Clone)]
pub enum StationFilter {
    Country(String),
    Language(String),
    Tag(String),
    Name(String),
}

impl StationFilter {
    fn param(&self) -> (&'static str, &str) {
        match self {
            StationFilter::Country(v) => ("country", v),
            StationFilter::Language(v) => ("language", v),
            StationFilter::Tag(v) => ("tag", v),
            StationFilter::Name(v) => ("name", v),
        }
    }
}

/// An upstream directory of stations.
#[async_trait]
pub trait StationSource: Send + Sync {
    async fn stations(&self, filter: StationFilter) -> Result<Vec<Station>>;
    async fn station_by_id(&self, id: &str) -> Result<Option<Station>>;
    async fn countries(&self) -> Result<Vec<Facet>>;
    async fn languages(&self) -> Result<Vec<Facet>>;
    async fn tags(&self) -> Result<Vec<Facet>>;
    async fn top_voted(&self, limit: u32) -> Result<Vec<Station>>;
    async fn top_clicked(&self, limit: u32) -> Result<Vec<Station>>;
    /// Fire-and-forget listen ping; the response body is ignored.
    async fn register_click(&self, id: &str) -> Result<()>;
}

// ── radio-browser API types (serde) ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RbStation {
    stationuuid: String,
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    url_resolved: String,
    #[serde(default)]
    homepage: String,
    #[serde(default)]
    favicon: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    countrycode: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    votes: i64,
    #[serde(default)]
    codec: String,
    #[serde(default)]
    bitrate: i64,
    #[serde(default)]
    lastcheckok: i64,
    #[serde(default)]
    lastchecktime_iso8601: Option<String>,
    #[serde(default)]
    clickcount: i64,
}

impl From<RbStation> for Station {
    fn from(rb: RbStation) -> Self {
        let tags = rb
            .tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let last_check_time = rb
            .lastchecktime_iso8601
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Station {
            id: rb.stationuuid,
            name: rb.name,
            url: rb.url,
            url_resolved: rb.url_resolved,
            homepage: rb.homepage,
            favicon: rb.favicon,
            tags,
            country: rb.country,
            country_code: rb.countrycode,
            language: rb.language,
            votes: rb.votes.max(0) as u32,
            codec: rb.codec,
            bitrate: rb.bitrate.max(0) as u32,
            last_check_ok: rb.lastcheckok != 0,
            last_check_time,
            click_count: rb.clickcount.max(0) as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RbFacet {
    name: String,
    stationcount: usize,
}

impl From<RbFacet> for Facet {
    fn from(rb: RbFacet) -> Self {
        Facet {
            name: rb.name,
            station_count: rb.stationcount,
        }
    }
}

// ── radio-browser client ──────────────────────────────────────────────────────

pub struct RadioBrowser {
    client: reqwest::Client,
    base_url: String,
    page_limit: u32,
}

impl RadioBrowser {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            page_limit: config.page_limit,
        }
    }

    /// Point the client at a mirror or a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            page_limit: 100,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.client
            .get(self.url(path))
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)
    }

    /// Filtered station query via POST /json/stations/search.
    async fn search_stations(&self, params: &[(&str, &str)]) -> Result<Vec<Station>> {
        let stations: Vec<RbStation> = self
            .client
            .post(self.url("/json/stations/search"))
            .form(params)
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)?;
        Ok(stations.into_iter().map(Station::from).collect())
    }
}

fn upstream(e: reqwest::Error) -> Error {
    Error::Upstream(e.to_string())
}

#[async_trait]
impl StationSource for RadioBrowser {
    async fn stations(&self, filter: StationFilter) -> Result<Vec<Station>> {
        let (key, value) = filter.param();
        let limit = self.page_limit.to_string();
        self.search_stations(&[
            (key, value),
            ("limit", &limit),
            ("order", "clickcount"),
            ("reverse", "true"),
            ("hidebroken", "true"),
        ])
        .await
    }

    async fn station_by_id(&self, id: &str) -> Result<Option<Station>> {
        let stations: Vec<RbStation> =
            self.get_json(&format!("/json/stations/byuuid/{}", id)).await?;
        Ok(stations.into_iter().next().map(Station::from))
    }

    async fn countries(&self) -> Result<Vec<Facet>> {
        let facets: Vec<RbFacet> = self
            .get_json("/json/countries?order=stationcount&reverse=true")
            .await?;
        Ok(facets.into_iter().map(Facet::from).collect())
    }

    async fn languages(&self) -> Result<Vec<Facet>> {
        let facets: Vec<RbFacet> = self
            .get_json("/json/languages?order=stationcount&reverse=true")
            .await?;
        Ok(facets.into_iter().map(Facet::from).collect())
    }

    async fn tags(&self) -> Result<Vec<Facet>> {
        let facets: Vec<RbFacet> = self
            .get_json("/json/tags?order=stationcount&reverse=true")
            .await?;
        Ok(facets.into_iter().map(Facet::from).collect())
    }

    async fn top_voted(&self, limit: u32) -> Result<Vec<Station>> {
        let stations: Vec<RbStation> =
            self.get_json(&format!("/json/stations/topvote/{}", limit)).await?;
        Ok(stations.into_iter().map(Station::from).collect())
    }

    async fn top_clicked(&self, limit: u32) -> Result<Vec<Station>> {
        let stations: Vec<RbStation> =
            self.get_json(&format!("/json/stations/topclick/{}", limit)).await?;
        Ok(stations.into_iter().map(Station::from).collect())
    }

    async fn register_click(&self, id: &str) -> Result<()> {
        let _: serde_json::Value = self.get_json(&format!("/json/url/{}", id)).await?;
        Ok(())
    }
}

// ── directory ─────────────────────────────────────────────────────────────────

/// The public directory: external listings merged with approved
/// suggestions.
pub struct Directory {
    source: Box<dyn StationSource>,
    suggestions: SuggestionStore,
}

impl Directory {
    pub fn new(source: Box<dyn StationSource>, suggestions: SuggestionStore) -> Self {
        Self {
            source,
            suggestions,
        }
    }

    pub async fn by_country(&self, country: &str) -> Result<Vec<Station>> {
        self.listing(StationFilter::Country(country.to_string())).await
    }

    pub async fn by_language(&self, language: &str) -> Result<Vec<Station>> {
        self.listing(StationFilter::Language(language.to_string())).await
    }

    pub async fn by_tag(&self, tag: &str) -> Result<Vec<Station>> {
        self.listing(StationFilter::Tag(tag.to_string())).await
    }

    pub async fn search(&self, name: &str) -> Result<Vec<Station>> {
        self.listing(StationFilter::Name(name.to_string())).await
    }

    async fn listing(&self, filter: StationFilter) -> Result<Vec<Station>> {
        let external = self.source.stations(filter.clone()).await?;

        let approved = match self.approved_for(&filter).await {
            Ok(stations) => stations,
            Err(e) => {
                warn!("approved-station lookup failed, serving external results only: {}", e);
                Vec::new()
            }
        };

        Ok(merge_stations(external, approved))
    }

    async fn approved_for(&self, filter: &StationFilter) -> Result<Vec<Station>> {
        let suggestions = match filter {
            StationFilter::Country(c) => self.suggestions.approved_by_country(c).await?,
            StationFilter::Language(l) => self.suggestions.approved_by_language(l).await?,
            StationFilter::Tag(t) => self.suggestions.approved_by_tag(t).await?,
            StationFilter::Name(n) => self.suggestions.approved_by_name(n).await?,
        };
        Ok(suggestions.iter().map(|s| s.to_station()).collect())
    }

    pub async fn station_by_id(&self, id: &str) -> Result<Option<Station>> {
        if let Some(station) = self.source.station_by_id(id).await? {
            return Ok(Some(station));
        }
        Ok(self
            .suggestions
            .approved_by_id(id)
            .await?
            .map(|s| s.to_station()))
    }

    pub async fn countries(&self) -> Result<Vec<Facet>> {
        self.source.countries().await
    }

    pub async fn languages(&self) -> Result<Vec<Facet>> {
        self.source.languages().await
    }

    pub async fn tags(&self) -> Result<Vec<Facet>> {
        self.source.tags().await
    }

    pub async fn top_voted(&self, limit: u32) -> Result<Vec<Station>> {
        self.source.top_voted(limit).await
    }

    pub async fn top_clicked(&self, limit: u32) -> Result<Vec<Station>> {
        self.source.top_clicked(limit).await
    }

    pub async fn register_click(&self, id: &str) -> Result<()> {
        self.source.register_click(id).await
    }
}

/// First-seen wins on a case-insensitive name key, with external results
/// ahead of approved ones. Two genuinely distinct stations sharing a name
/// therefore collapse to the external entry; this matches the directory's
/// long-standing merge rule and is not worth inventing new semantics over.
pub fn merge_stations(external: Vec<Station>, approved: Vec<Station>) -> Vec<Station> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(external.len() + approved.len());
    for station in external.into_iter().chain(approved) {
        let key = station.name.trim().to_lowercase();
        if seen.insert(key) {
            merged.push(station);
        }
    }
    merged
}
