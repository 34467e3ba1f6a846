// ABOUTME: Workout query shaper — weekly volume and top-exercise aggregates
// ABOUTME: Analogous to the nutrition shaper
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Workout shaper.
//!
//! Weekly volume/sets come straight out of `workout_cache`'s scalar
//! columns. "Top exercises" requires reaching into each workout's
//! `raw_payload`; that extraction happens
//! in Rust over the already-bounded row window rather than in SQL, to
//! keep the query itself simple and the per-exercise aggregation
//! testable without a database.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::storage::Database;

use super::enforce_cap;

mod caps {
    pub const QUICK_CHECK_WORKOUTS: usize = 7;
    pub const DEFAULT_WEEKS: usize = 12;
    pub const DEFAULT_TOP_EXERCISES: usize = 5;
    pub const TROUBLESHOOTING_WEEKS: usize = 8;
    pub const TROUBLESHOOTING_TOP_EXERCISES: usize = 8;
    pub const TROUBLESHOOTING_RECENT: usize = 10;
    pub const HISTORICAL_MONTHS: usize = 36;
    /// Bound on how many raw workouts are scanned to build top-exercise
    /// stats, so a heavy lifter with years of history never balloons cost.
    pub const TOP_EXERCISE_SCAN_WINDOW: i64 = 120;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutScenario {
    QuickCheck,
    Default,
    Troubleshooting,
    Historical,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkoutRecentRow {
    pub external_workout_id: String,
    pub workout_date: DateTime<Utc>,
    pub title: String,
    pub total_sets: i32,
    pub total_volume: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkoutWeeklyRow {
    pub week_start: NaiveDate,
    pub total_volume: f64,
    pub total_sets: i64,
    pub workout_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkoutMonthlyRow {
    pub month_start: NaiveDate,
    pub total_volume: f64,
    pub workout_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopExercise {
    pub name: String,
    pub sessions: usize,
    pub max_weight_kg: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct WorkoutSummary {
    pub recent: Vec<WorkoutRecentRow>,
    pub weekly: Vec<WorkoutWeeklyRow>,
    pub monthly: Vec<WorkoutMonthlyRow>,
    pub top_exercises: Vec<TopExercise>,
}

async fn fetch_recent(db: &Database, user_id: Uuid, limit: i64) -> AppResult<Vec<WorkoutRecentRow>> {
    let rows = sqlx::query_as::<_, WorkoutRecentRow>(
        r"
        SELECT external_workout_id, workout_date, title, total_sets, total_volume
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

async fn fetch_weekly(db: &Database, user_id: Uuid, limit_weeks: i64) -> AppResult<Vec<WorkoutWeeklyRow>> {
    let rows = sqlx::query_as::<_, WorkoutWeeklyRow>(
        r"
        SELECT
            date_trunc('week', workout_date)::date AS week_start,
            sum(total_volume) AS total_volume,
            sum(total_sets) AS total_sets,
            count(*) AS workout_count
        FROM workout_cache
        WHERE user_id = $1
        GROUP BY week_start
        ORDER BY week_start DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(limit_weeks)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

async fn fetch_monthly(db: &Database, user_id: Uuid, limit_months: i64) -> AppResult<Vec<WorkoutMonthlyRow>> {
    let rows = sqlx::query_as::<_, WorkoutMonthlyRow>(
        r"
        SELECT
            date_trunc('month', workout_date)::date AS month_start,
            sum(total_volume) AS total_volume,
            count(*) AS workout_count
        FROM workout_cache
        WHERE user_id = $1
        GROUP BY month_start
        ORDER BY month_start DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(limit_months)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// Extract `{exercise name -> (sessions, max working weight)}` from a window
/// of raw workout payloads, shaped as `workout_importer` produces them
/// (`exercises[].name`, `exercises[].sets[].weight_kg`, `.warmup`).
pub(crate) fn top_exercises_from_payloads(payloads: &[Value], top_n: usize) -> Vec<TopExercise> {
    let mut stats: HashMap<String, (usize, f64)> = HashMap::new();

    for payload in payloads {
        let Some(exercises) = payload.get("exercises").and_then(Value::as_array) else {
            continue;
        };
        for exercise in exercises {
            let Some(name) = exercise.get("name").and_then(Value::as_str) else {
                continue;
            };
            let session_max = exercise
                .get("sets")
                .and_then(Value::as_array)
                .map(|sets| {
                    sets.iter()
                        .filter(|s| !s.get("warmup").and_then(Value::as_bool).unwrap_or(false))
                        .filter_map(|s| s.get("weight_kg").and_then(Value::as_f64))
                        .fold(0.0_f64, f64::max)
                })
                .unwrap_or(0.0);

            let entry = stats.entry(name.to_string()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 = entry.1.max(session_max);
        }
    }

    let mut ranked: Vec<TopExercise> = stats
        .into_iter()
        .map(|(name, (sessions, max_weight_kg))| TopExercise {
            name,
            sessions,
            max_weight_kg,
        })
        .collect();
    ranked.sort_by(|a, b| b.sessions.cmp(&a.sessions).then(b.max_weight_kg.total_cmp(&a.max_weight_kg)));
    ranked.truncate(top_n);
    ranked
}

async fn top_exercises(db: &Database, user_id: Uuid, top_n: usize) -> AppResult<Vec<TopExercise>> {
    let rows: Vec<(Value,)> = sqlx::query_as(
        r"
        SELECT raw_payload FROM workout_cache
        WHERE user_id = $1
        ORDER BY workout_date DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(caps::TOP_EXERCISE_SCAN_WINDOW)
    .fetch_all(db.pool())
    .await?;

    let payloads: Vec<Value> = rows.into_iter().map(|(v,)| v).collect();
    Ok(top_exercises_from_payloads(&payloads, top_n))
}

/// Produce a bounded workout summary for the given scenario.
///
/// # Errors
///
/// Returns a database error if any underlying query fails.
pub async fn workout_summary(db: &Database, user_id: Uuid, scenario: WorkoutScenario) -> AppResult<WorkoutSummary> {
    let mut summary = WorkoutSummary::default();

    match scenario {
        WorkoutScenario::QuickCheck => {
            let recent = fetch_recent(db, user_id, caps::QUICK_CHECK_WORKOUTS as i64).await?;
            summary.recent = enforce_cap(recent, caps::QUICK_CHECK_WORKOUTS, "workout/quick_check");
        }
        WorkoutScenario::Default => {
            let weekly = fetch_weekly(db, user_id, caps::DEFAULT_WEEKS as i64).await?;
            let top = top_exercises(db, user_id, caps::DEFAULT_TOP_EXERCISES).await?;
            summary.weekly = enforce_cap(weekly, caps::DEFAULT_WEEKS, "workout/default/weekly");
            summary.top_exercises = top;
        }
        WorkoutScenario::Troubleshooting => {
            let weekly = fetch_weekly(db, user_id, caps::TROUBLESHOOTING_WEEKS as i64).await?;
            let top = top_exercises(db, user_id, caps::TROUBLESHOOTING_TOP_EXERCISES).await?;
            let recent = fetch_recent(db, user_id, caps::TROUBLESHOOTING_RECENT as i64).await?;
            summary.weekly = enforce_cap(weekly, caps::TROUBLESHOOTING_WEEKS, "workout/troubleshooting/weekly");
            summary.top_exercises = top;
            summary.recent = enforce_cap(recent, caps::TROUBLESHOOTING_RECENT, "workout/troubleshooting/recent");
        }
        WorkoutScenario::Historical => {
            let monthly = fetch_monthly(db, user_id, caps::HISTORICAL_MONTHS as i64).await?;
            summary.monthly = enforce_cap(monthly, caps::HISTORICAL_MONTHS, "workout/historical");
        }
    }

    Ok(summary)
}

/// One session's working max for a single named exercise, oldest-first.
/// Feeds `analysis::plateau::detect_plateau` directly.
#[derive(Debug, Clone, Copy)]
pub struct ExerciseSession {
    pub date: NaiveDate,
    pub max_weight_kg: f64,
}

/// Extract one exercise's per-session working max from a window of raw
/// workout payloads.
///
/// # Errors
///
/// Returns a database error if the underlying query fails.
pub async fn exercise_progression(
    db: &Database,
    user_id: Uuid,
    exercise_name: &str,
    lookback_sessions: i64,
) -> AppResult<Vec<ExerciseSession>> {
    let rows: Vec<(DateTime<Utc>, Value)> = sqlx::query_as(
        r"
        SELECT workout_date, raw_payload FROM workout_cache
        WHERE user_id = $1
        ORDER BY workout_date DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(caps::TOP_EXERCISE_SCAN_WINDOW)
    .fetch_all(db.pool())
    .await?;

    let mut sessions: Vec<ExerciseSession> = rows
        .into_iter()
        .filter_map(|(workout_date, payload)| {
            let exercises = payload.get("exercises")?.as_array()?;
            let session_max = exercises
                .iter()
                .filter(|e| e.get("name").and_then(Value::as_str) == Some(exercise_name))
                .flat_map(|e| e.get("sets").and_then(Value::as_array).into_iter().flatten())
                .filter(|s| !s.get("warmup").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|s| s.get("weight_kg").and_then(Value::as_f64))
                .fold(None::<f64>, |acc, w| Some(acc.map_or(w, |a: f64| a.max(w))));

            session_max.map(|max_weight_kg| ExerciseSession {
                date: workout_date.date_naive(),
                max_weight_kg,
            })
        })
        .collect();

    sessions.sort_by_key(|s| s.date);
    let start = sessions.len().saturating_sub(lookback_sessions.max(0) as usize);
    Ok(sessions[start..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_exercises_ranks_by_session_count_then_max_weight() {
        let payloads = vec![
            serde_json::json!({"exercises": [
                {"name": "Bench Press", "sets": [{"weight_kg": 80.0, "warmup": false}]}
            ]}),
            serde_json::json!({"exercises": [
                {"name": "Bench Press", "sets": [{"weight_kg": 85.0, "warmup": false}]},
                {"name": "Squat", "sets": [{"weight_kg": 120.0, "warmup": false}]}
            ]}),
        ];
        let top = top_exercises_from_payloads(&payloads, 5);
        assert_eq!(top[0].name, "Bench Press");
        assert_eq!(top[0].sessions, 2);
        assert_eq!(top[0].max_weight_kg, 85.0);
        assert_eq!(top[1].name, "Squat");
    }

    #[test]
    fn warmup_sets_excluded_from_max_weight() {
        let payloads = vec![serde_json::json!({"exercises": [
            {"name": "Deadlift", "sets": [
                {"weight_kg": 150.0, "warmup": true},
                {"weight_kg": 140.0, "warmup": false}
            ]}
        ]})];
        let top = top_exercises_from_payloads(&payloads, 5);
        assert_eq!(top[0].max_weight_kg, 140.0);
    }
}
