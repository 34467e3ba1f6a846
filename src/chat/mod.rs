// ABOUTME: Chat session/message persistence with streaming-safe finalization
// ABOUTME: Session-ordering and one-row-per-turn persistence rules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Chat persistence service.
//!
//! The contract this module exists to uphold: the user message is written
//! before the model is ever called, and the assistant message is written
//! exactly once per turn, in a `finally`-equivalent path that runs whether
//! the turn succeeded or failed partway through. No per-token database
//! write ever happens; token deltas pass straight through to the HTTP
//! layer's stream.

use sqlx::types::Json;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{ChatMessage, ChatSession, MessageRole, ToolCallRecord};
use crate::storage::Database;

/// Resolve an existing session or create a new one for `user_id`.
///
/// # Errors
///
/// Returns a database error if the lookup or insert fails.
pub async fn get_or_create_session(
    db: &Database,
    user_id: Uuid,
    session_id: Option<Uuid>,
) -> AppResult<ChatSession> {
    if let Some(id) = session_id {
        if let Some(existing) = sqlx::query_as::<_, ChatSession>(
            "SELECT id, user_id, name, created_at, last_activity_at FROM chat_sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?
        {
            return Ok(existing);
        }
    }

    let id = session_id.unwrap_or_else(Uuid::new_v4);
    let session = sqlx::query_as::<_, ChatSession>(
        r"
        INSERT INTO chat_sessions (id, user_id, name)
        VALUES ($1, $2, NULL)
        ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
        RETURNING id, user_id, name, created_at, last_activity_at
        ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_one(db.pool())
    .await?;

    Ok(session)
}

/// Acquire the per-session ordering lock for the lifetime of the current
/// transaction. Must be called inside a
/// transaction on `conn`; Postgres releases the lock automatically at
/// commit or rollback.
pub(crate) async fn lock_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session_id: Uuid,
) -> AppResult<()> {
    // pg_advisory_xact_lock takes a single bigint; fold the UUID down to one.
    let key = session_id.as_u128() as i64;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Write the user's message immediately, before any model call, under the
/// session's ordering lock. A crash mid-turn after this point never loses
/// the user's input.
///
/// # Errors
///
/// Returns a database error if the transaction fails.
pub async fn record_user_message(db: &Database, session_id: Uuid, content: &str) -> AppResult<ChatMessage> {
    let mut tx = db.pool().begin().await?;
    lock_session(&mut tx, session_id).await?;

    let id = Uuid::new_v4();
    let message = sqlx::query_as::<_, ChatMessage>(
        r"
        INSERT INTO chat_messages (id, session_id, role, content, token_count, tool_calls)
        VALUES ($1, $2, $3, $4, $5, NULL)
        RETURNING id, session_id, role, content, created_at, token_count, tool_calls, embedding
        ",
    )
    .bind(id)
    .bind(session_id)
    .bind(MessageRole::User)
    .bind(content)
    .bind(0_i32)
    .fetch_one(&mut *tx)
    .await?;

    touch_session(&mut tx, session_id).await?;
    tx.commit().await?;

    Ok(message)
}

/// Persist the aggregated assistant text as one row, with the tool-call
/// log attached. Called exactly once per successful turn, regardless of
/// how many tool calls it made.
///
/// # Errors
///
/// Returns a database error if the transaction fails.
pub async fn finalize_assistant_turn(
    db: &Database,
    session_id: Uuid,
    content: &str,
    token_count: i32,
    tool_calls: Vec<ToolCallRecord>,
) -> AppResult<ChatMessage> {
    let mut tx = db.pool().begin().await?;
    lock_session(&mut tx, session_id).await?;

    let tool_calls_json = if tool_calls.is_empty() {
        None
    } else {
        Some(Json(tool_calls))
    };

    let id = Uuid::new_v4();
    let message = sqlx::query_as::<_, ChatMessage>(
        r"
        INSERT INTO chat_messages (id, session_id, role, content, token_count, tool_calls)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, session_id, role, content, created_at, token_count, tool_calls, embedding
        ",
    )
    .bind(id)
    .bind(session_id)
    .bind(MessageRole::Assistant)
    .bind(content)
    .bind(token_count)
    .bind(tool_calls_json)
    .fetch_one(&mut *tx)
    .await?;

    touch_session(&mut tx, session_id).await?;
    tx.commit().await?;

    Ok(message)
}

async fn touch_session(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, session_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE chat_sessions SET last_activity_at = now() WHERE id = $1")
        .bind(session_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Load the most recent `limit` messages in chronological order, for the
/// agent's context window.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn recent_messages(db: &Database, session_id: Uuid, limit: i64) -> AppResult<Vec<ChatMessage>> {
    let mut rows = sqlx::query_as::<_, ChatMessage>(
        r"
        SELECT id, session_id, role, content, created_at, token_count, tool_calls, embedding
        FROM chat_messages
        WHERE session_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        ",
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(db.pool())
    .await?;
    rows.reverse();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lock_key_is_stable_for_same_uuid() {
        let id = Uuid::new_v4();
        let key_a = id.as_u128() as i64;
        let key_b = id.as_u128() as i64;
        assert_eq!(key_a, key_b);
    }
}
