// ABOUTME: Read accessor for the workout cache, outside the shaper/analysis path
// ABOUTME: Backs GET /workout-history directly with no aggregation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Workout cache reads.
//!
//! [`crate::shapers::workout`] builds bounded, agent-facing summaries;
//! this module exists only for a direct, unaggregated listing of recent
//! rows, the same way [`crate::dashboard`] bypasses the agent for its
//! own read-only endpoints.

use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::WorkoutCache;
use crate::storage::Database;

/// Most recent `limit` workouts for `user_id`, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_recent(db: &Database, user_id: Uuid, limit: i64) -> AppResult<Vec<WorkoutCache>> {
    let rows = sqlx::query_as::<_, WorkoutCache>(
        r"
        SELECT user_id, external_workout_id, workout_date, title, total_sets,
               total_volume, muscle_groups, raw_payload, updated_at
        FROM workout_cache
        WHERE user_id = $1
        ORDER BY workout_date DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}
