// ABOUTME: Chat route handlers — non-streaming and raw-chunked-stream turns
// ABOUTME: The stream handler's first chunk is a literal `SESSION_ID: <uuid>\n` prefix
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Chat routes.
//!
//! `/chat` runs a full turn and returns the finished text.
//! `/chat/stream` returns a raw chunked body instead of an `SSE` stream:
//! the very first chunk is `SESSION_ID: <uuid>\n` so a client that never
//! supplied a session id can learn the one the turn was recorded under,
//! and every following chunk is a slice of assistant text as it is
//! generated.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::AppState;

use super::user_id::resolve as resolve_user_id;

#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatTurnResponse {
    pub response: String,
    pub session_id: Uuid,
}

#[must_use]
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(send_turn))
        .route("/chat/stream", post(stream_turn))
        .with_state(state)
}

async fn send_turn(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatTurnRequest>,
) -> AppResult<Json<ChatTurnResponse>> {
    let user_id = resolve_user_id(req.user_id.as_deref());
    let session = crate::chat::get_or_create_session(&state.db, user_id, req.session_id).await?;

    let message = state
        .agent
        .run_turn(&state.db, &state.tracker, user_id, session.id, &req.message, None)
        .await?;

    Ok(Json(ChatTurnResponse {
        response: message.content,
        session_id: session.id,
    }))
}

async fn stream_turn(State(state): State<Arc<AppState>>, Json(req): Json<ChatTurnRequest>) -> AppResult<Response> {
    let user_id = resolve_user_id(req.user_id.as_deref());
    let session = crate::chat::get_or_create_session(&state.db, user_id, req.session_id).await?;
    let session_id = session.id;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let agent = Arc::clone(&state.agent);
    let db = state.db.clone();
    let tracker = state.tracker.clone();
    let message = req.message.clone();
    tokio::spawn(async move {
        if let Err(err) = agent
            .run_turn(&db, &tracker, user_id, session_id, &message, Some(tx))
            .await
        {
            tracing::error!(error = %err, session_id = %session_id, "chat stream turn failed");
        }
    });

    let prelude = format!("SESSION_ID: {session_id}\n");
    let token_stream = tokio_stream::wrappers::UnboundedReceiverStream::new(rx)
        .map(|token| Ok::<_, std::io::Error>(axum::body::Bytes::from(token)));
    let body_stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(axum::body::Bytes::from(prelude)) })
        .chain(token_stream);

    Ok(Response::builder()
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from_stream(body_stream))
        .map_err(|e| crate::errors::AppError::internal(format!("failed to build streaming response: {e}")))?
        .into_response())
}
