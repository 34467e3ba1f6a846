// ABOUTME: Derives HealthMetricDaily from HealthMetricRaw, and HealthWeeklySummary from the daily tier
// ABOUTME: Both are "regenerated on demand" — no derived row is hand-maintained
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Aggregate derivation.
//!
//! `HealthMetricDaily` is explicitly "recomputable from `HealthMetricRaw`";
//! `HealthWeeklySummary` is "fully derived; regenerated on demand". Both
//! derivations are plain SQL aggregations run for one user over a bounded
//! date range, then upserted through the same COALESCE/replace semantics
//! the rest of the upsert service uses — there is no separate code path
//! for "derived" vs. "ingested" writes once the aggregation query has run.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::storage::Database;

/// Recompute `health_metric_daily` rows for `user_id` over
/// `[from_date, to_date]` from `health_metric_raw`, one row per
/// `(date, metric_type)` collapsed via `avg` for point-in-time metrics
/// (weight, resting heart rate) and `sum` for cumulative ones (steps,
/// active calories, sleep hours).
///
/// # Errors
///
/// Returns a database error if either statement fails.
pub async fn derive_daily_from_raw(
    db: &Database,
    user_id: Uuid,
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> AppResult<u64> {
    let result = sqlx::query(
        r"
        INSERT INTO health_metric_daily
            (user_id, date, steps, weight_kg, sleep_hours, active_calories, resting_heart_rate, other_metrics, updated_at)
        SELECT
            user_id,
            recorded_at::date AS date,
            sum(value) FILTER (WHERE metric_type = 'step_count')::bigint,
            avg(value) FILTER (WHERE metric_type = 'weight_kg' OR metric_type = 'body_mass'),
            sum(value) FILTER (WHERE metric_type = 'sleep_hours' OR metric_type = 'sleep_analysis'),
            sum(value) FILTER (WHERE metric_type = 'active_energy_burned'),
            avg(value) FILTER (WHERE metric_type = 'resting_heart_rate'),
            '{}'::jsonb,
            now()
        FROM health_metric_raw
        WHERE user_id = $1 AND recorded_at::date BETWEEN $2 AND $3
        GROUP BY user_id, date
        ON CONFLICT (user_id, date) DO UPDATE SET
            steps = COALESCE(EXCLUDED.steps, health_metric_daily.steps),
            weight_kg = COALESCE(EXCLUDED.weight_kg, health_metric_daily.weight_kg),
            sleep_hours = COALESCE(EXCLUDED.sleep_hours, health_metric_daily.sleep_hours),
            active_calories = COALESCE(EXCLUDED.active_calories, health_metric_daily.active_calories),
            resting_heart_rate = COALESCE(EXCLUDED.resting_heart_rate, health_metric_daily.resting_heart_rate),
            updated_at = now()
        ",
    )
    .bind(user_id)
    .bind(from_date)
    .bind(to_date)
    .execute(db.pool())
    .await?;

    Ok(result.rows_affected())
}

/// Regenerate `health_weekly_summary` for `user_id` over trailing
/// `lookback_weeks` calendar weeks (Monday start), computing averages and
/// the week-over-week weight delta from `health_metric_daily`.
///
/// # Errors
///
/// Returns a database error if the statement fails.
pub async fn regenerate_weekly_summary(db: &Database, user_id: Uuid, lookback_weeks: i64) -> AppResult<u64> {
    let result = sqlx::query(
        r"
        WITH weekly AS (
            SELECT
                date_trunc('week', date)::date AS week_start,
                avg(steps) AS avg_steps,
                avg(weight_kg) AS avg_weight_kg,
                avg(sleep_hours) AS avg_sleep_hours,
                avg(active_calories) AS avg_active_calories
            FROM health_metric_daily
            WHERE user_id = $1
              AND date >= date_trunc('week', now()) - make_interval(weeks => $2::int)
            GROUP BY week_start
        ),
        with_delta AS (
            SELECT
                week_start,
                avg_steps,
                avg_weight_kg,
                avg_sleep_hours,
                avg_active_calories,
                avg_weight_kg - lag(avg_weight_kg) OVER (ORDER BY week_start) AS weight_delta_kg
            FROM weekly
        )
        INSERT INTO health_weekly_summary
            (user_id, week_start, avg_steps, avg_weight_kg, avg_sleep_hours, avg_active_calories, weight_delta_kg)
        SELECT $1, week_start, avg_steps, avg_weight_kg, avg_sleep_hours, avg_active_calories, weight_delta_kg
        FROM with_delta
        ON CONFLICT (user_id, week_start) DO UPDATE SET
            avg_steps = EXCLUDED.avg_steps,
            avg_weight_kg = EXCLUDED.avg_weight_kg,
            avg_sleep_hours = EXCLUDED.avg_sleep_hours,
            avg_active_calories = EXCLUDED.avg_active_calories,
            weight_delta_kg = EXCLUDED.weight_delta_kg
        ",
    )
    .bind(user_id)
    .bind(lookback_weeks)
    .execute(db.pool())
    .await?;

    Ok(result.rows_affected())
}
