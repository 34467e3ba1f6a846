// ABOUTME: Health-metric query shaper — daily steps/sleep/weight and weekly summaries
// ABOUTME: Analogous to the nutrition shaper
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Health shaper.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::storage::Database;

use super::enforce_cap;

mod caps {
    pub const QUICK_CHECK_DAYS: usize = 7;
    pub const DEFAULT_DAYS: usize = 30;
    pub const DEFAULT_WEEKS: usize = 12;
    pub const TROUBLESHOOTING_DAYS: usize = 7;
    pub const TROUBLESHOOTING_WEEKS: usize = 12;
    pub const HISTORICAL_MONTHS: usize = 36;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthScenario {
    QuickCheck,
    Default,
    Troubleshooting,
    Historical,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HealthDailyRow {
    pub date: NaiveDate,
    pub steps: Option<i64>,
    pub weight_kg: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub active_calories: Option<f64>,
    pub resting_heart_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HealthWeeklyRow {
    pub week_start: NaiveDate,
    pub avg_steps: Option<f64>,
    pub avg_weight_kg: Option<f64>,
    pub avg_sleep_hours: Option<f64>,
    pub avg_active_calories: Option<f64>,
    pub weight_delta_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HealthMonthlyRow {
    pub month_start: NaiveDate,
    pub avg_steps: Option<f64>,
    pub avg_weight_kg: Option<f64>,
    pub avg_sleep_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct HealthSummary {
    pub daily: Vec<HealthDailyRow>,
    pub weekly: Vec<HealthWeeklyRow>,
    pub monthly: Vec<HealthMonthlyRow>,
}

async fn fetch_daily(db: &Database, user_id: Uuid, limit: i64) -> AppResult<Vec<HealthDailyRow>> {
    let rows = sqlx::query_as::<_, HealthDailyRow>(
        r"
        SELECT date, steps, weight_kg, sleep_hours, active_calories, resting_heart_rate
        FROM health_metric_daily
        WHERE user_id = $1
        ORDER BY date DESC
        LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// Pull pre-materialized rows from `health_weekly_summary`.
async fn fetch_weekly(db: &Database, user_id: Uuid, limit_weeks: i64) -> AppResult<Vec<HealthWeeklyRow>> {
    let rows = sqlx::query_as::<_, HealthWeeklyRow>(
        r"
        SELECT week_start, avg_steps, avg_weight_kg, avg_sleep_hours, avg_active_calories, weight_delta_kg
        FROM health_weekly_summary
        WHERE user_id = $1
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

async fn fetch_monthly(db: &Database, user_id: Uuid, limit_months: i64) -> AppResult<Vec<HealthMonthlyRow>> {
    let rows = sqlx::query_as::<_, HealthMonthlyRow>(
        r"
        SELECT
            date_trunc('month', date)::date AS month_start,
            avg(steps) AS avg_steps,
            avg(weight_kg) AS avg_weight_kg,
            avg(sleep_hours) AS avg_sleep_hours
        FROM health_metric_daily
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

/// Produce a bounded health-metric summary for the given scenario.
///
/// # Errors
///
/// Returns a database error if any underlying query fails.
pub async fn health_summary(db: &Database, user_id: Uuid, scenario: HealthScenario) -> AppResult<HealthSummary> {
    let mut summary = HealthSummary::default();

    match scenario {
        HealthScenario::QuickCheck => {
            let daily = fetch_daily(db, user_id, caps::QUICK_CHECK_DAYS as i64).await?;
            summary.daily = enforce_cap(daily, caps::QUICK_CHECK_DAYS, "health/quick_check");
        }
        HealthScenario::Default => {
            let daily = fetch_daily(db, user_id, caps::DEFAULT_DAYS as i64).await?;
            let weekly = fetch_weekly(db, user_id, caps::DEFAULT_WEEKS as i64).await?;
            summary.daily = enforce_cap(daily, caps::DEFAULT_DAYS, "health/default/daily");
            summary.weekly = enforce_cap(weekly, caps::DEFAULT_WEEKS, "health/default/weekly");
        }
        HealthScenario::Troubleshooting => {
            let daily = fetch_daily(db, user_id, caps::TROUBLESHOOTING_DAYS as i64).await?;
            let weekly = fetch_weekly(db, user_id, caps::TROUBLESHOOTING_WEEKS as i64).await?;
            summary.daily = enforce_cap(daily, caps::TROUBLESHOOTING_DAYS, "health/troubleshooting/daily");
            summary.weekly = enforce_cap(weekly, caps::TROUBLESHOOTING_WEEKS, "health/troubleshooting/weekly");
        }
        HealthScenario::Historical => {
            let monthly = fetch_monthly(db, user_id, caps::HISTORICAL_MONTHS as i64).await?;
            summary.monthly = enforce_cap(monthly, caps::HISTORICAL_MONTHS, "health/historical");
        }
    }

    Ok(summary)
}
