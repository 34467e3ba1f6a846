// ABOUTME: Read-only dashboard aggregation endpoints, bypassing the agent for speed
// ABOUTME: Deliberately independent of the analysis module — these are direct SQL, not agent tools
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Dashboard aggregation.
//!
//! Every query here is a single bounded-result-set statement served
//! straight off `workout_cache`. Unlike `crate::shapers` and
//! `crate::analysis`, nothing here is exposed to the agent's tool
//! registry; these exist purely for a human-facing dashboard that wants
//! to skip the LLM round-trip entirely.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::storage::Database;

/// Trailing window for the training heatmap.
const HEATMAP_DAYS: i64 = 28;
/// Trailing window for the weekly training score series.
const SCORE_WEEKS: i64 = 12;
/// Trailing window the muscle-group distribution is computed over.
const MUSCLE_GROUP_LOOKBACK_DAYS: i64 = 28;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WeeklyTrainingScore {
    pub week_start: NaiveDate,
    pub workout_count: i64,
    pub total_volume: f64,
    /// A simple composite: frequency matters more than raw tonnage, so
    /// sessions are weighted heavier than volume in this score.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MuscleGroupShare {
    pub muscle_group: String,
    pub session_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub workout_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub weekly_training_score: Vec<WeeklyTrainingScore>,
    pub muscle_group_distribution: Vec<MuscleGroupShare>,
    pub training_heatmap: Vec<HeatmapDay>,
}

async fn weekly_training_score(db: &Database, user_id: Uuid) -> AppResult<Vec<WeeklyTrainingScore>> {
    let rows = sqlx::query_as::<_, WeeklyTrainingScore>(
        r"
        SELECT
            date_trunc('week', workout_date)::date AS week_start,
            count(*) AS workout_count,
            sum(total_volume) AS total_volume,
            (count(*) * 10.0) + (sum(total_volume) / 1000.0) AS score
        FROM workout_cache
        WHERE user_id = $1
        GROUP BY week_start
        ORDER BY week_start DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(SCORE_WEEKS)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

async fn muscle_group_distribution(db: &Database, user_id: Uuid) -> AppResult<Vec<MuscleGroupShare>> {
    let rows = sqlx::query_as::<_, MuscleGroupShare>(
        r"
        SELECT
            muscle_group,
            count(*) AS session_count
        FROM workout_cache, jsonb_array_elements_text(muscle_groups) AS muscle_group
        WHERE user_id = $1
          AND workout_date >= now() - make_interval(days => $2::int)
        GROUP BY muscle_group
        ORDER BY session_count DESC
        ",
    )
    .bind(user_id)
    .bind(MUSCLE_GROUP_LOOKBACK_DAYS as i32)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

async fn training_heatmap(db: &Database, user_id: Uuid) -> AppResult<Vec<HeatmapDay>> {
    let rows = sqlx::query_as::<_, HeatmapDay>(
        r"
        SELECT
            workout_date::date AS date,
            count(*) AS workout_count
        FROM workout_cache
        WHERE user_id = $1
          AND workout_date >= now() - make_interval(days => $2::int)
        GROUP BY date
        ORDER BY date DESC
        ",
    )
    .bind(user_id)
    .bind(HEATMAP_DAYS as i32)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// Compose all three dashboard aggregates for `GET /dashboard/stats`.
///
/// # Errors
///
/// Returns a database error if any underlying query fails.
pub async fn dashboard_stats(db: &Database, user_id: Uuid) -> AppResult<DashboardStats> {
    let weekly_training_score = weekly_training_score(db, user_id).await?;
    let muscle_group_distribution = muscle_group_distribution(db, user_id).await?;
    let training_heatmap = training_heatmap(db, user_id).await?;

    Ok(DashboardStats {
        weekly_training_score,
        muscle_group_distribution,
        training_heatmap,
    })
}
