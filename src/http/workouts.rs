// ABOUTME: Workout history route — a direct, unaggregated listing
// ABOUTME: Thin wrapper over storage::workouts::list_recent
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::errors::AppResult;
use crate::models::WorkoutCache;
use crate::storage::workouts::list_recent;
use crate::AppState;

use super::user_id::resolve as resolve_user_id;

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct WorkoutHistoryQuery {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

#[must_use]
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new().route("/workout-history", get(workout_history)).with_state(state)
}

async fn workout_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WorkoutHistoryQuery>,
) -> AppResult<Json<Vec<WorkoutCache>>> {
    let user_id = resolve_user_id(params.user_id.as_deref());
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 500);
    let rows = list_recent(&state.db, user_id, limit).await?;
    Ok(Json(rows))
}
