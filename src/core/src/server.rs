use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use radiomon_protocol::{ArtistDetail, RecentPlay, StationStatus, StatsResponse, TimeRange};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::history::{HistoryStore, DEFAULT_TOP_LIMIT};
use crate::monitor::StatusRegistry;

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");
const DEFAULT_RECENT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Shared state accessible by handlers.
#[derive(Clone)]
pub(crate) struct DashboardState {
    history: HistoryStore,
    status: StatusRegistry,
    stations: Arc<Vec<String>>,
}

impl DashboardState {
    fn check_station(&self, station: Option<&str>) -> Result<(), ApiError> {
        match station {
            Some(name) if !self.stations.iter().any(|s| s == name) => {
                Err(ApiError::UnknownStation(name.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Build the dashboard router.
///
/// HTML pages at `/` and `/stations/{name}`, JSON under `/api`, and `/health`.
/// `stations` lists the stations with analytics enabled.
pub fn build_router(
    history: HistoryStore,
    status: StatusRegistry,
    stations: Vec<String>,
) -> Router {
    let state = DashboardState {
        history,
        status,
        stations: Arc::new(stations),
    };

    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/stations/{name}", get(station_page))
        .route("/api/stations", get(api_stations))
        .route("/api/status", get(api_status))
        .route("/api/stats", get(api_stats))
        .route("/api/recent", get(api_recent))
        .route("/api/artist", get(api_artist))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
enum ApiError {
    UnknownStation(String),
    Storage(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::UnknownStation(name) => {
                (StatusCode::NOT_FOUND, format!("unknown station: {name}"))
            }
            Self::Storage(err) => {
                tracing::warn!(error = %err, "dashboard query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "history query failed".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Run a blocking history query off the async workers.
async fn query<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Storage(format!("query task: {err}")))?
        .map_err(ApiError::Storage)
}

async fn health() -> &'static str {
    "ok"
}

async fn index() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn station_page(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Result<Html<&'static str>, ApiError> {
    state.check_station(Some(&name))?;
    Ok(Html(DASHBOARD_HTML))
}

async fn api_stations(State(state): State<DashboardState>) -> Json<Vec<String>> {
    Json(state.stations.as_ref().clone())
}

async fn api_status(State(state): State<DashboardState>) -> Json<Vec<StationStatus>> {
    Json(state.status.list())
}

#[derive(Debug, Default, Deserialize)]
struct StatsParams {
    station: Option<String>,
    days: Option<u32>,
    limit: Option<usize>,
}

async fn api_stats(
    State(state): State<DashboardState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, ApiError> {
    let station = non_empty(params.station);
    state.check_station(station.as_deref())?;
    let range = TimeRange::from_days(params.days);
    let limit = clamp_limit(params.limit, DEFAULT_TOP_LIMIT);
    let history = state.history.clone();
    let stats = query(move || history.stats(station.as_deref(), range, Utc::now(), limit)).await?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
struct RecentParams {
    station: Option<String>,
    limit: Option<usize>,
}

async fn api_recent(
    State(state): State<DashboardState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<RecentPlay>>, ApiError> {
    let station = non_empty(params.station);
    state.check_station(station.as_deref())?;
    let limit = clamp_limit(params.limit, DEFAULT_RECENT_LIMIT);
    let history = state.history.clone();
    let recent = query(move || history.recent(station.as_deref(), limit)).await?;
    Ok(Json(recent))
}

#[derive(Debug, Deserialize)]
struct ArtistParams {
    artist: String,
    station: Option<String>,
    days: Option<u32>,
    limit: Option<usize>,
}

async fn api_artist(
    State(state): State<DashboardState>,
    Query(params): Query<ArtistParams>,
) -> Result<Json<ArtistDetail>, ApiError> {
    let station = non_empty(params.station);
    state.check_station(station.as_deref())?;
    let range = TimeRange::from_days(params.days);
    let limit = clamp_limit(params.limit, DEFAULT_TOP_LIMIT);
    let history = state.history.clone();
    let artist = params.artist;
    let detail = query(move || {
        history.artist_detail(&artist, station.as_deref(), range, Utc::now(), limit)
    })
    .await?;
    Ok(Json(detail))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}
