// ABOUTME: HTTP route module organization, one file per domain
// ABOUTME: Each module contains only route wiring and thin handler functions
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! HTTP façade.
//!
//! A thin layer over the storage/ingest/agent modules: every handler
//! here parses a request, delegates to the service it fronts, and
//! serializes the result. No business logic lives in this module.

pub mod chat;
pub mod dashboard;
pub mod ingest;
pub mod profile;
pub mod user_id;
pub mod workouts;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Request bodies above this size are rejected before they reach a
/// handler — a nutrition/health export is the largest expected upload.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the full application router: every domain's routes merged
/// under one `CORS`/tracing/timeout layer stack.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(chat::routes(Arc::clone(&state)))
        .merge(ingest::routes(Arc::clone(&state)))
        .merge(workouts::routes(Arc::clone(&state)))
        .merge(dashboard::routes(Arc::clone(&state)))
        .merge(profile::routes(state))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(120)))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
}
