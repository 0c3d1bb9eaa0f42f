use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::backfill;
use crate::error::AppError;
use crate::matching::RunOptions;
use crate::models::{RegisterQueriesInput, UserSearchQuery};
use crate::progress::ProgressEvent;
use crate::scheduler;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StartMatchingInput {
    #[serde(default)]
    pub force_reanalyze: bool,
    #[serde(default)]
    pub latest_day_only: bool,
}

/// `POST /matching/{user_id}/start`. Returns immediately;
/// the run proceeds on a spawned background task.
pub async fn start(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    body: Option<Json<StartMatchingInput>>,
) -> impl IntoResponse {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let opts = RunOptions {
        force_reanalyze: input.force_reanalyze,
        latest_day_only: input.latest_day_only,
    };

    state.run_registry.try_start(user_id, state.clone(), opts).await;
    let current = state.progress.get(user_id).unwrap_or_else(ProgressEvent::idle);
    (StatusCode::ACCEPTED, Json(current))
}

/// `GET /matching/{user_id}/status`.
pub async fn status(State(state): State<AppState>, Path(user_id): Path<i32>) -> impl IntoResponse {
    Json(state.progress.get(user_id).unwrap_or_else(ProgressEvent::idle))
}

/// `POST /matching/{user_id}/cancel`. Best-effort cooperative
/// cancel; flips a flag the running task checks at sub-step boundaries.
pub async fn cancel(State(state): State<AppState>, Path(user_id): Path<i32>) -> Result<impl IntoResponse, AppError> {
    if state.run_registry.cancel(user_id).await {
        Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "cancelling": true }))))
    } else {
        Err(AppError::NotFound(format!("no active matching run for user {user_id}")))
    }
}

/// `POST /matching/{user_id}/queries`. Replaces the user's
/// active search queries and triggers the Backfill Planner.
pub async fn register_queries(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(input): Json<RegisterQueriesInput>,
) -> Result<impl IntoResponse, AppError> {
    let queries = UserSearchQuery::replace_for_user(&state.pool, user_id, &input).await?;

    let backfill_state = state.clone();
    tokio::spawn(async move {
        backfill::plan_and_run(&backfill_state, user_id).await;
    });

    Ok(Json(queries))
}

/// `POST /scheduler/tick`. Normally timer-driven; exposed for
/// tests and operational nudges.
pub async fn scheduler_tick(State(state): State<AppState>) -> impl IntoResponse {
    scheduler::scheduler_tick(&state).await;
    StatusCode::ACCEPTED
}
