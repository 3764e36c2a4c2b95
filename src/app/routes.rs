use crate::app::error::AppError;
use crate::app::state::AppState;
use crate::core::snap::snap_guess;
use crate::domain::model::{ArtworkCandidate, Coordinate, LeaderboardEntry, RoundResult, SnappedGuess};
use crate::utils::error::GameError;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::get,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let cors = if state.allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    };

    Router::new()
        .route("/api/random-object", get(random_object))
        .route("/api/round/score", post(score_round))
        .route("/api/leaderboard", get(leaderboard_top).post(leaderboard_submit))
        .route("/api/snap", get(snap))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn random_object(State(state): State<AppState>) -> Result<Json<ArtworkCandidate>, AppError> {
    let candidate = state.candidates.random_candidate().await?;
    state.rounds.start_round(&candidate);
    Ok(Json(candidate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub object_id: u64,
    pub guess: Coordinate,
}

fn validate_guess(guess: Coordinate) -> Result<Coordinate, GameError> {
    if guess.is_valid() {
        Ok(guess)
    } else {
        Err(GameError::validation("Invalid guess"))
    }
}

async fn score_round(
    State(state): State<AppState>,
    body: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<RoundResult>, AppError> {
    let Json(request) = body?;
    if request.object_id == 0 {
        return Err(GameError::validation("Invalid objectId").into());
    }
    let guess = validate_guess(request.guess)?;

    let result = state.rounds.score_round(request.object_id, guess).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub scores: Vec<LeaderboardEntry>,
}

async fn leaderboard_top(State(state): State<AppState>) -> Result<Json<LeaderboardResponse>, AppError> {
    let scores = state.leaderboard.top().await?;
    Ok(Json(LeaderboardResponse { scores }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardSubmission {
    pub name: String,
    pub score: f64,
}

async fn leaderboard_submit(
    State(state): State<AppState>,
    body: Result<Json<LeaderboardSubmission>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(submission) = body?;
    state.leaderboard.submit(&submission.name, submission.score).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct SnapParams {
    pub lat: f64,
    pub lng: f64,
}

async fn snap(
    State(state): State<AppState>,
    params: Result<Query<SnapParams>, QueryRejection>,
) -> Result<Json<SnappedGuess>, AppError> {
    let Query(params) = params?;
    let click = validate_guess(Coordinate::new(params.lat, params.lng))?;
    Ok(Json(snap_guess(state.geocoder.as_deref(), click).await))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
