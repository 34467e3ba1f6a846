// ABOUTME: Dashboard stats route — thin wrapper over dashboard::dashboard_stats
// ABOUTME: Bypasses the agent entirely, same as the module it fronts
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::dashboard::{dashboard_stats, DashboardStats};
use crate::errors::AppResult;
use crate::AppState;

use super::user_id::resolve as resolve_user_id;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    user_id: Option<String>,
}

#[must_use]
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new().route("/dashboard/stats", get(stats)).with_state(state)
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardQuery>,
) -> AppResult<Json<DashboardStats>> {
    let user_id = resolve_user_id(params.user_id.as_deref());
    let stats = dashboard_stats(&state.db, user_id).await?;
    Ok(Json(stats))
}
