// ABOUTME: Bulk conflict-safe persistence for every incrementally-ingested table
// ABOUTME: One function per conflict target; batched and transactional
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Upsert service.
//!
//! Each function:
//! 1. De-duplicates the incoming slice on its conflict key (last occurrence
//!    wins), so a single `INSERT ... ON CONFLICT DO UPDATE` never targets
//!    the same row twice in one statement.
//! 2. Splits the slice into batches of at most `batch_size` rows.
//! 3. Runs each batch in its own transaction — the whole batch commits or
//!    none of it does.
//! 4. Reports how many rows were inserted vs. updated by reading Postgres's
//!    `xmax = 0` trick (`xmax` is the deleting-transaction id; it is zero
//!    on a row version nobody has touched, i.e. one this very `INSERT`
//!    created rather than updated).
//!
//! A `CHECK` constraint violation aborts the batch and is surfaced as
//! `AppError::IngestConflict` carrying up to 20 offending records — the
//! caller may retry minus those rows.

use std::collections::HashMap;

use sqlx::Row;
use uuid::Uuid;

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{HealthMetricDaily, HealthMetricRaw, NutritionDay, WorkoutCache};

use super::Database;

/// Maximum number of offending records attached to an `IngestConflict`.
const MAX_OFFENDERS: usize = 20;

/// Result of an upsert call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UpsertOutcome {
    pub new_records: usize,
    pub updated_records: usize,
    pub skipped_duplicates: usize,
}

impl UpsertOutcome {
    fn merge(&mut self, other: Self) {
        self.new_records += other.new_records;
        self.updated_records += other.updated_records;
        self.skipped_duplicates += other.skipped_duplicates;
    }
}

fn dedupe_last_wins<T, K: Eq + std::hash::Hash>(rows: Vec<T>, key: impl Fn(&T) -> K) -> (Vec<T>, usize) {
    let mut by_key: HashMap<K, T> = HashMap::new();
    let total = rows.len();
    for row in rows {
        by_key.insert(key(&row), row);
    }
    let deduped: Vec<T> = by_key.into_values().collect();
    let skipped = total - deduped.len();
    (deduped, skipped)
}

fn chunks<T>(rows: Vec<T>, size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return vec![rows];
    }
    let mut out = Vec::new();
    let mut iter = rows.into_iter().peekable();
    while iter.peek().is_some() {
        out.push(iter.by_ref().take(size).collect());
    }
    out
}

fn ingest_conflict_from(err: sqlx::Error, offenders: &[serde_json::Value]) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        // Postgres CHECK violation SQLSTATE is 23514.
        if db_err.code().as_deref() == Some("23514") {
            return AppError::new(
                ErrorCode::IngestConflict,
                format!("CHECK constraint violated: {db_err}"),
            )
            .with_offenders(offenders.iter().take(MAX_OFFENDERS).cloned().collect());
        }
    }
    AppError::from(err)
}

/// Conflict target: `(user_id, date)`. Scalars and `raw` both replaced
/// wholesale on conflict (last-writer-wins semantics for `NutritionDay`).
///
/// # Errors
///
/// Returns `IngestConflict` if a `CHECK` constraint rejects a row, or a
/// generic database error for any other failure.
pub async fn upsert_nutrition_days(
    db: &Database,
    rows: Vec<NutritionDay>,
    batch_size: usize,
) -> AppResult<UpsertOutcome> {
    let (deduped, skipped) = dedupe_last_wins(rows, |r| (r.user_id, r.date));
    let mut outcome = UpsertOutcome {
        skipped_duplicates: skipped,
        ..Default::default()
    };

    for batch in chunks(deduped, batch_size) {
        let offenders: Vec<serde_json::Value> = batch
            .iter()
            .map(|r| serde_json::json!({"user_id": r.user_id, "date": r.date}))
            .collect();

        let mut tx = db.pool().begin().await?;
        for row in &batch {
            let result = sqlx::query(
                r"
                INSERT INTO nutrition_days
                    (user_id, date, calories, protein_g, carbs_g, fats_g, fiber_g, raw, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
                ON CONFLICT (user_id, date) DO UPDATE SET
                    calories = EXCLUDED.calories,
                    protein_g = EXCLUDED.protein_g,
                    carbs_g = EXCLUDED.carbs_g,
                    fats_g = EXCLUDED.fats_g,
                    fiber_g = EXCLUDED.fiber_g,
                    raw = EXCLUDED.raw,
                    updated_at = now()
                RETURNING (xmax = 0) AS inserted
                ",
            )
            .bind(row.user_id)
            .bind(row.date)
            .bind(row.calories)
            .bind(row.protein_g)
            .bind(row.carbs_g)
            .bind(row.fats_g)
            .bind(row.fiber_g)
            .bind(&row.raw)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ingest_conflict_from(e, &offenders))?;

            if result.get::<bool, _>("inserted") {
                outcome.new_records += 1;
            } else {
                outcome.updated_records += 1;
            }
        }
        tx.commit().await?;
    }

    Ok(outcome)
}

/// Conflict target: `(user_id, recorded_at, metric_type, source)`. Raw
/// points are append-only — `DO NOTHING` on conflict.
///
/// # Errors
///
/// Returns `IngestConflict` or a generic database error.
pub async fn upsert_health_metric_raw(
    db: &Database,
    rows: Vec<HealthMetricRaw>,
    batch_size: usize,
) -> AppResult<UpsertOutcome> {
    let (deduped, skipped) = dedupe_last_wins(rows, |r| {
        (r.user_id, r.recorded_at, r.metric_type.clone(), r.source.clone())
    });
    let mut outcome = UpsertOutcome {
        skipped_duplicates: skipped,
        ..Default::default()
    };

    for batch in chunks(deduped, batch_size) {
        let offenders: Vec<serde_json::Value> = batch
            .iter()
            .map(|r| serde_json::json!({"user_id": r.user_id, "recorded_at": r.recorded_at}))
            .collect();

        let mut tx = db.pool().begin().await?;
        for row in &batch {
            let result = sqlx::query(
                r"
                INSERT INTO health_metric_raw
                    (user_id, recorded_at, metric_type, source, value, unit, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (user_id, recorded_at, metric_type, source) DO NOTHING
                RETURNING true AS inserted
                ",
            )
            .bind(row.user_id)
            .bind(row.recorded_at)
            .bind(&row.metric_type)
            .bind(&row.source)
            .bind(row.value)
            .bind(&row.unit)
            .bind(&row.metadata)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| ingest_conflict_from(e, &offenders))?;

            if result.is_some() {
                outcome.new_records += 1;
            } else {
                outcome.skipped_duplicates += 1;
            }
        }
        tx.commit().await?;
    }

    Ok(outcome)
}

/// Conflict target: `(user_id, date)`, `COALESCE` semantics — a newer
/// non-null value wins, an older non-null value is preserved if the
/// incoming value is null.
///
/// # Errors
///
/// Returns `IngestConflict` or a generic database error.
pub async fn upsert_health_metric_daily(
    db: &Database,
    rows: Vec<HealthMetricDaily>,
    batch_size: usize,
) -> AppResult<UpsertOutcome> {
    let (deduped, skipped) = dedupe_last_wins(rows, |r| (r.user_id, r.date));
    let mut outcome = UpsertOutcome {
        skipped_duplicates: skipped,
        ..Default::default()
    };

    for batch in chunks(deduped, batch_size) {
        let offenders: Vec<serde_json::Value> = batch
            .iter()
            .map(|r| serde_json::json!({"user_id": r.user_id, "date": r.date}))
            .collect();

        let mut tx = db.pool().begin().await?;
        for row in &batch {
            let result = sqlx::query(
                r"
                INSERT INTO health_metric_daily
                    (user_id, date, steps, weight_kg, sleep_hours, active_calories,
                     resting_heart_rate, other_metrics, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
                ON CONFLICT (user_id, date) DO UPDATE SET
                    steps = COALESCE(EXCLUDED.steps, health_metric_daily.steps),
                    weight_kg = COALESCE(EXCLUDED.weight_kg, health_metric_daily.weight_kg),
                    sleep_hours = COALESCE(EXCLUDED.sleep_hours, health_metric_daily.sleep_hours),
                    active_calories = COALESCE(EXCLUDED.active_calories, health_metric_daily.active_calories),
                    resting_heart_rate = COALESCE(EXCLUDED.resting_heart_rate, health_metric_daily.resting_heart_rate),
                    other_metrics = health_metric_daily.other_metrics || EXCLUDED.other_metrics,
                    updated_at = now()
                RETURNING (xmax = 0) AS inserted
                ",
            )
            .bind(row.user_id)
            .bind(row.date)
            .bind(row.steps)
            .bind(row.weight_kg)
            .bind(row.sleep_hours)
            .bind(row.active_calories)
            .bind(row.resting_heart_rate)
            .bind(&row.other_metrics)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ingest_conflict_from(e, &offenders))?;

            if result.get::<bool, _>("inserted") {
                outcome.new_records += 1;
            } else {
                outcome.updated_records += 1;
            }
        }
        tx.commit().await?;
    }

    Ok(outcome)
}

/// Conflict target: `(user_id, external_workout_id)`. `DO UPDATE` all
/// columns — the local cache always reflects the tracker's latest version
///.
///
/// # Errors
///
/// Returns `IngestConflict` or a generic database error.
pub async fn upsert_workout_cache(
    db: &Database,
    rows: Vec<WorkoutCache>,
    batch_size: usize,
) -> AppResult<UpsertOutcome> {
    let (deduped, skipped) = dedupe_last_wins(rows, |r| (r.user_id, r.external_workout_id.clone()));
    let mut outcome = UpsertOutcome {
        skipped_duplicates: skipped,
        ..Default::default()
    };

    for batch in chunks(deduped, batch_size) {
        let offenders: Vec<serde_json::Value> = batch
            .iter()
            .map(|r| serde_json::json!({"user_id": r.user_id, "external_workout_id": r.external_workout_id}))
            .collect();

        let mut tx = db.pool().begin().await?;
        for row in &batch {
            let result = sqlx::query(
                r"
                INSERT INTO workout_cache
                    (user_id, external_workout_id, workout_date, title, total_sets,
                     total_volume, muscle_groups, raw_payload, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
                ON CONFLICT (user_id, external_workout_id) DO UPDATE SET
                    workout_date = EXCLUDED.workout_date,
                    title = EXCLUDED.title,
                    total_sets = EXCLUDED.total_sets,
                    total_volume = EXCLUDED.total_volume,
                    muscle_groups = EXCLUDED.muscle_groups,
                    raw_payload = EXCLUDED.raw_payload,
                    updated_at = now()
                RETURNING (xmax = 0) AS inserted
                ",
            )
            .bind(row.user_id)
            .bind(&row.external_workout_id)
            .bind(row.workout_date)
            .bind(&row.title)
            .bind(row.total_sets)
            .bind(row.total_volume)
            .bind(&row.muscle_groups)
            .bind(&row.raw_payload)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ingest_conflict_from(e, &offenders))?;

            if result.get::<bool, _>("inserted") {
                outcome.new_records += 1;
            } else {
                outcome.updated_records += 1;
            }
        }
        tx.commit().await?;
    }

    Ok(outcome)
}

impl std::ops::AddAssign for UpsertOutcome {
    fn add_assign(&mut self, other: Self) {
        self.merge(other);
    }
}

/// Distinct user ids touched by a batch, used by callers that need to
/// trigger weekly-summary regeneration after an ingest.
#[must_use]
pub fn distinct_users(rows: &[HealthMetricDaily]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .filter_map(|r| seen.insert(r.user_id).then_some(r.user_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_last_occurrence() {
        let rows = vec![("a", 1), ("a", 2), ("b", 3)];
        let (deduped, skipped) = dedupe_last_wins(rows, |r| r.0);
        assert_eq!(skipped, 1);
        let a = deduped.iter().find(|r| r.0 == "a").unwrap();
        assert_eq!(a.1, 2, "later occurrence must win on a shuffled conflict key");
    }

    #[test]
    fn chunks_splits_evenly_and_handles_remainder() {
        let rows: Vec<i32> = (0..7).collect();
        let batches = chunks(rows, 3);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
    }
}
