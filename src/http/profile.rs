// ABOUTME: Minimal user-profile CRUD routes
// ABOUTME: Thin wrapper over storage::users
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::storage::users::{get_user, upsert_profile};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[must_use]
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/user/profile/:id", get(get_profile))
        .route("/user/profile", post(save_profile))
        .with_state(state)
}

async fn get_profile(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    get_user(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no user with id {id}")))
}

async fn save_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertProfileRequest>,
) -> AppResult<Json<User>> {
    let user = upsert_profile(&state.db, req.id, req.display_name.as_deref(), req.email.as_deref()).await?;
    Ok(Json(user))
}
