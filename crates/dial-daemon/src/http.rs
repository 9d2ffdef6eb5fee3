//! HTTP API, the surface UI pages call into.
//!
//! Thin handlers over the services, a JSON error envelope mapping the
//! error taxonomy to status codes, and two SSE endpoints: the daemon bus
//! (state updates, notices, favorites-changed) and the per-station
//! live-comment feed.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dial_core::model::{ReactionKind, Station, SuggestionDraft};
use dial_core::session::SessionManager;
use dial_core::Error;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::bus::Bus;
use crate::directory::Directory;
use crate::favorites::FavoritesStore;
use crate::interactions::Interactions;
use crate::player::PlayerSession;
use crate::suggest::SuggestionStore;

#[derive(Clone)]
pub struct AppState {
    pub player: Arc<PlayerSession>,
    pub directory: Arc<Directory>,
    pub favorites: Arc<FavoritesStore>,
    pub interactions: Arc<Interactions>,
    pub suggestions: SuggestionStore,
    pub sessions: SessionManager,
    pub bus: Bus,
}

// ── error envelope ────────────────────────────────────────────────────────────

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::AlreadyVoted => StatusCode::CONFLICT,
            Error::Upstream(_) | Error::Playback(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ── router / server ───────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        // playback session
        .route("/api/state", get(player_state))
        .route("/api/play", post(play))
        .route("/api/toggle", post(toggle))
        .route("/api/stop", post(stop))
        .route("/api/volume", get(get_volume))
        .route("/api/volume/:volume", post(set_volume))
        // session
        .route(
            "/api/session",
            get(get_session).put(login).delete(logout),
        )
        // directory
        .route("/api/countries", get(countries))
        .route("/api/languages", get(languages))
        .route("/api/tags", get(tags))
        .route("/api/stations/search", get(search_stations))
        .route("/api/stations/country/:country", get(stations_by_country))
        .route("/api/stations/language/:language", get(stations_by_language))
        .route("/api/stations/tag/:tag", get(stations_by_tag))
        .route("/api/stations/top/voted", get(top_voted))
        .route("/api/stations/top/clicked", get(top_clicked))
        .route("/api/stations/:id", get(station_by_id))
        .route("/api/stations/:id/click", post(register_click))
        // favorites
        .route("/api/favorites", get(list_favorites))
        .route(
            "/api/favorites/:id",
            get(is_favorite).put(add_favorite).delete(remove_favorite),
        )
        // reactions
        .route(
            "/api/stations/:id/reactions",
            get(reactions).put(add_reaction).delete(remove_reaction),
        )
        // comments
        .route(
            "/api/stations/:id/comments",
            get(comments).post(add_comment),
        )
        .route("/api/comments/:id", axum::routing::delete(delete_comment))
        // live comments
        .route(
            "/api/stations/:id/live",
            get(live_comments).post(add_live_comment),
        )
        .route("/api/live/:id", axum::routing::delete(delete_live_comment))
        .route("/api/stations/:id/live/events", get(live_events))
        // suggestion workflow
        .route("/api/suggestions", post(submit_suggestion))
        .route("/api/suggestions/pending", get(pending_suggestions))
        .route("/api/suggestions/:id/approve", post(approve_suggestion))
        .route("/api/suggestions/:id/reject", post(reject_suggestion))
        .route(
            "/api/suggestions/:id/vote",
            axum::routing::put(vote).delete(remove_vote),
        )
        // bus
        .route("/api/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind_address: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP API listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── playback handlers ─────────────────────────────────────────────────────────

async fn player_state(State(state): State<AppState>) -> Json<dial_core::state::PlayerState> {
    Json(state.player.state().await)
}

async fn play(State(state): State<AppState>, Json(station): Json<Station>) -> ApiResult<StatusCode> {
    state.player.play_station(station).await?;
    Ok(StatusCode::OK)
}

async fn toggle(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.player.toggle_play_pause().await?;
    Ok(StatusCode::OK)
}

async fn stop(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.player.stop_playback().await?;
    Ok(StatusCode::OK)
}

async fn get_volume(State(state): State<AppState>) -> Json<serde_json::Value> {
    let volume = (state.player.state().await.volume * 100.0).round() as u8;
    Json(json!({ "volume": volume }))
}

async fn set_volume(
    State(state): State<AppState>,
    Path(volume): Path<i32>,
) -> ApiResult<StatusCode> {
    state.player.set_volume(volume as f32 / 100.0).await?;
    Ok(StatusCode::OK)
}

// ── session handlers ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
    user_id: String,
    #[serde(default)]
    admin: bool,
}

async fn get_session(State(state): State<AppState>) -> Json<dial_core::session::Session> {
    Json(state.sessions.current().await)
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Json<dial_core::session::Session> {
    Json(state.sessions.login(req.user_id, req.admin).await)
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    state.sessions.logout().await;
    StatusCode::OK
}

// ── directory handlers ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchParams {
    name: String,
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<u32>,
}

async fn countries(State(state): State<AppState>) -> ApiResult<Json<Vec<dial_core::model::Facet>>> {
    Ok(Json(state.directory.countries().await?))
}

async fn languages(State(state): State<AppState>) -> ApiResult<Json<Vec<dial_core::model::Facet>>> {
    Ok(Json(state.directory.languages().await?))
}

async fn tags(State(state): State<AppState>) -> ApiResult<Json<Vec<dial_core::model::Facet>>> {
    Ok(Json(state.directory.tags().await?))
}

async fn search_stations(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(state.directory.search(&params.name).await?))
}

async fn stations_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(state.directory.by_country(&country).await?))
}

async fn stations_by_language(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(state.directory.by_language(&language).await?))
}

async fn stations_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(state.directory.by_tag(&tag).await?))
}

async fn top_voted(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(state.directory.top_voted(params.limit.unwrap_or(20)).await?))
}

async fn top_clicked(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(state.directory.top_clicked(params.limit.unwrap_or(20)).await?))
}

async fn station_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Station>> {
    let station = state
        .directory
        .station_by_id(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no station {}", id)))?;
    Ok(Json(station))
}

async fn register_click(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    // Listen pings are best-effort; a failed ping is not the caller's
    // problem.
    if let Err(e) = state.directory.register_click(&id).await {
        warn!("click registration for {} failed: {}", id, e);
    }
    StatusCode::OK
}

// ── favorites handlers ────────────────────────────────────────────────────────

async fn list_favorites(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let session = state.sessions.current().await;
    Ok(Json(state.favorites.favorites(&session).await?))
}

async fn is_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let session = state.sessions.current().await;
    let favorite = state.favorites.is_favorite(&session, &id).await?;
    Ok(Json(json!({ "favorite": favorite })))
}

async fn add_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.favorites.add(&session, &id).await?;
    Ok(StatusCode::OK)
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.favorites.remove(&session, &id).await?;
    Ok(StatusCode::OK)
}

// ── reaction handlers ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReactionRequest {
    kind: ReactionKind,
}

async fn reactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let counts = state.interactions.reaction_counts(&id).await?;
    let session = state.sessions.current().await;
    let mine = match session.user_id() {
        Some(_) => state.interactions.user_reaction(&session, &id).await?,
        None => None,
    };
    Ok(Json(json!({
        "likes": counts.likes,
        "dislikes": counts.dislikes,
        "mine": mine,
    })))
}

async fn add_reaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReactionRequest>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.interactions.add_reaction(&session, &id, req.kind).await?;
    Ok(StatusCode::OK)
}

async fn remove_reaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.interactions.remove_reaction(&session, &id).await?;
    Ok(StatusCode::OK)
}

// ── comment handlers ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CommentRequest {
    body: String,
    #[serde(default)]
    dedication: Option<String>,
}

async fn comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<dial_core::model::Comment>>> {
    Ok(Json(state.interactions.comments(&id).await?))
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Json<dial_core::model::Comment>> {
    let session = state.sessions.current().await;
    let comment = state.interactions.add_comment(&session, &id, &req.body).await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.interactions.delete_comment(&session, &id).await?;
    Ok(StatusCode::OK)
}

async fn live_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<dial_core::model::LiveComment>>> {
    Ok(Json(state.interactions.live_comments(&id).await?))
}

async fn add_live_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Json<dial_core::model::LiveComment>> {
    let session = state.sessions.current().await;
    let comment = state
        .interactions
        .add_live_comment(&session, &id, &req.body, req.dedication)
        .await?;
    Ok(Json(comment))
}

async fn delete_live_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.interactions.delete_live_comment(&session, &id).await?;
    Ok(StatusCode::OK)
}

// ── suggestion handlers ───────────────────────────────────────────────────────

async fn submit_suggestion(
    State(state): State<AppState>,
    Json(draft): Json<SuggestionDraft>,
) -> ApiResult<Json<dial_core::model::Suggestion>> {
    let session = state.sessions.current().await;
    Ok(Json(state.suggestions.submit(&session, draft).await?))
}

async fn pending_suggestions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<dial_core::model::Suggestion>>> {
    let session = state.sessions.current().await;
    Ok(Json(state.suggestions.pending(&session).await?))
}

async fn approve_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.suggestions.approve(&session, &id).await?;
    Ok(StatusCode::OK)
}

async fn reject_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.suggestions.reject(&session, &id).await?;
    Ok(StatusCode::OK)
}

async fn vote(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.suggestions.vote(&session, &id).await?;
    Ok(StatusCode::OK)
}

async fn remove_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.sessions.current().await;
    state.suggestions.remove_vote(&session, &id).await?;
    Ok(StatusCode::OK)
}

// ── SSE handlers ──────────────────────────────────────────────────────────────

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.bus.subscribe();
    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("ok"));
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(data) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(data));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("SSE client missed {} bus events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

/// Per-station live-comment feed. Dropping the connection tears the
/// subscription down.
async fn live_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.interactions.subscribe_live(&id);
    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("ok"));
        loop {
            match rx.recv().await {
                Ok(comment) => {
                    if let Ok(data) = serde_json::to_string(&comment) {
                        yield Ok(Event::default().event("live_comment").data(data));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("live subscriber missed {} comments", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
