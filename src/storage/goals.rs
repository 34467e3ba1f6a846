// ABOUTME: UserGoals / UserPreferences CRUD — loaded by the agent's "load user context" step
// ABOUTME: One active goals row per (user, kind); one preferences row per user
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Goals and preferences.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{GoalKind, UserGoals, UserPreferences};
use crate::storage::Database;

/// All active goals for a user, one row per kind.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_goals(db: &Database, user_id: Uuid) -> AppResult<Vec<UserGoals>> {
    let rows = sqlx::query_as::<_, UserGoals>(
        "SELECT user_id, kind, target, created_at, updated_at FROM user_goals WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// Set (insert or replace) the active goal for `(user_id, kind)`.
///
/// # Errors
///
/// Returns a database error if the statement fails.
pub async fn set_goal(
    db: &Database,
    user_id: Uuid,
    kind: GoalKind,
    target: serde_json::Value,
) -> AppResult<UserGoals> {
    let now = Utc::now();
    sqlx::query(
        r"
        INSERT INTO user_goals (user_id, kind, target, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (user_id, kind) DO UPDATE SET
            target = EXCLUDED.target,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(user_id)
    .bind(kind)
    .bind(sqlx::types::Json(&target))
    .bind(now)
    .execute(db.pool())
    .await?;

    Ok(UserGoals {
        user_id,
        kind,
        target: sqlx::types::Json(target),
        created_at: now,
        updated_at: now,
    })
}

/// Fetch the single preferences row for a user, if one has been set.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_preferences(db: &Database, user_id: Uuid) -> AppResult<Option<UserPreferences>> {
    let row = sqlx::query_as::<_, UserPreferences>(
        r"
        SELECT user_id, allowed_equipment, disliked_exercises, injury_notes, updated_at
        FROM user_preferences WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_optional(db.pool())
    .await?;
    Ok(row)
}

/// Replace the preferences row for a user.
///
/// # Errors
///
/// Returns a database error if the statement fails.
pub async fn upsert_preferences(
    db: &Database,
    user_id: Uuid,
    allowed_equipment: Vec<String>,
    disliked_exercises: Vec<String>,
    injury_notes: Option<String>,
) -> AppResult<UserPreferences> {
    let now = Utc::now();
    sqlx::query(
        r"
        INSERT INTO user_preferences (user_id, allowed_equipment, disliked_exercises, injury_notes, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE SET
            allowed_equipment = EXCLUDED.allowed_equipment,
            disliked_exercises = EXCLUDED.disliked_exercises,
            injury_notes = EXCLUDED.injury_notes,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(user_id)
    .bind(sqlx::types::Json(&allowed_equipment))
    .bind(sqlx::types::Json(&disliked_exercises))
    .bind(&injury_notes)
    .bind(now)
    .execute(db.pool())
    .await?;

    Ok(UserPreferences {
        user_id,
        allowed_equipment: sqlx::types::Json(allowed_equipment),
        disliked_exercises: sqlx::types::Json(disliked_exercises),
        injury_notes,
        updated_at: now,
    })
}
