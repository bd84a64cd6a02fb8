//! HTTP route definitions

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::app::AppState;
use crate::game::GameError;
use crate::store::Team;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::NearbyTeam;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let team_routes = Router::new()
        .route("/", get(list_teams_handler))
        .route("/location", post(update_location_handler))
        .route("/nearby/:team_name", get(nearby_handler))
        .route("/kill", post(kill_handler));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .nest("/api/teams", team_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS configuration - `*` or comma-separated origins
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Service endpoints
// ============================================================================

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Proximity tag server is running",
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_teams: Option<usize>,
    connections: usize,
    groups: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_teams = match state.store.list_active().await {
        Ok(teams) => Some(teams.len()),
        Err(e) => {
            warn!(error = %e, "Health check could not reach team store");
            None
        }
    };

    Json(HealthResponse {
        status: if active_teams.is_some() { "ok" } else { "degraded" },
        uptime_secs: uptime_secs(),
        active_teams,
        connections: state.gateway.connection_count(),
        groups: state.gateway.group_count(),
    })
}

// ============================================================================
// Team endpoints
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLocationRequest {
    team_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

async fn update_location_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateLocationRequest>,
) -> Result<Json<Team>, AppError> {
    let team = state
        .teams
        .report_location(req.team_name.as_deref(), req.latitude, req.longitude)
        .await?;
    Ok(Json(team))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearbyQuery {
    max_distance: Option<f64>,
}

async fn nearby_handler(
    State(state): State<AppState>,
    Path(team_name): Path<String>,
    ApiQuery(query): ApiQuery<NearbyQuery>,
) -> Result<Json<Vec<NearbyTeam>>, AppError> {
    let nearby = state.teams.nearby(&team_name, query.max_distance).await?;
    Ok(Json(nearby))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KillRequest {
    team_name: Option<String>,
    target_team_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KillResponse {
    message: &'static str,
    killer_team: String,
    killed_team: String,
    distance: f64,
    timestamp: DateTime<Utc>,
}

async fn kill_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<KillRequest>,
) -> Result<Json<KillResponse>, AppError> {
    let record = state
        .teams
        .eliminate(req.team_name.as_deref(), req.target_team_name.as_deref())
        .await?;

    Ok(Json(KillResponse {
        message: "Team killed successfully",
        killer_team: record.killer,
        killed_team: record.target,
        distance: record.distance,
        timestamp: record.timestamp,
    }))
}

async fn list_teams_handler(State(state): State<AppState>) -> Result<Json<Vec<Team>>, AppError> {
    Ok(Json(state.teams.active_teams().await?))
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose rejections surface as validation errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
struct ApiJson<T>(T);

/// Query string whose rejections surface as validation errors
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
struct ApiQuery<T>(T);

// ============================================================================
// Error handling
// ============================================================================

/// HTTP-facing wrapper that maps team errors onto status codes
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AppError(#[from] GameError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            GameError::Validation(_) | GameError::TooFar { .. } => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::AlreadyEliminated(_) => StatusCode::CONFLICT,
            GameError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GameError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(GameError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self(GameError::validation(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }

        let mut body = serde_json::json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        if let Some(distance) = self.0.distance() {
            body["distance"] = serde_json::json!(distance);
        }

        (status, Json(body)).into_response()
    }
}
