// ABOUTME: Nutrition query shaper — four bounded scenarios
// ABOUTME: Backed by straightforward aggregate SQL against nutrition_days
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Nutrition shaper.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::storage::Database;

use super::enforce_cap;

/// Row caps per scenario.
mod caps {
    pub const QUICK_CHECK_DAYS: usize = 7;
    pub const DEFAULT_DAYS: usize = 30;
    pub const DEFAULT_WEEKS: usize = 12;
    pub const TROUBLESHOOTING_DAYS: usize = 7;
    pub const TROUBLESHOOTING_WEEKS: usize = 12;
    /// Not named explicitly in spec; chosen generously (3 years) since the
    /// scenario's whole purpose is a long lookback at near-zero token cost.
    pub const HISTORICAL_MONTHS: usize = 36;
}

/// Named aggregation recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NutritionScenario {
    /// Last 7 daily rows, scalar fields only (target ≤ ~120 tokens).
    QuickCheck,
    /// Last 30 daily rows + last 12 weekly averages (target ≤ ~600 tokens).
    Default,
    /// Last 7 daily rows + last 12 weekly averages + protein-per-kg-bodyweight
    /// (target ≤ ~1000 tokens).
    Troubleshooting,
    /// Monthly aggregates over all history (target ≤ ~250 tokens).
    Historical,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NutritionDailyRow {
    pub date: NaiveDate,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub fiber_g: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NutritionWeeklyRow {
    pub week_start: NaiveDate,
    pub avg_calories: f64,
    pub avg_protein_g: f64,
    pub avg_carbs_g: f64,
    pub avg_fats_g: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NutritionMonthlyRow {
    pub month_start: NaiveDate,
    pub avg_calories: f64,
    pub avg_protein_g: f64,
    pub avg_carbs_g: f64,
    pub avg_fats_g: f64,
    pub days_logged: i64,
}

/// Output of [`nutrition_summary`]. Fields irrelevant to the requested
/// scenario are left empty/`None` rather than omitted, so callers always
/// match on the same shape.
#[derive(Debug, Clone, Serialize, Default)]
pub struct NutritionSummary {
    pub daily: Vec<NutritionDailyRow>,
    pub weekly: Vec<NutritionWeeklyRow>,
    pub monthly: Vec<NutritionMonthlyRow>,
    /// Only populated for `troubleshooting` (needs the latest bodyweight).
    pub protein_per_kg_bodyweight: Option<f64>,
}

async fn fetch_daily(db: &Database, user_id: Uuid, limit: i64) -> AppResult<Vec<NutritionDailyRow>> {
    let rows = sqlx::query_as::<_, NutritionDailyRow>(
        r"
        SELECT date, calories, protein_g, carbs_g, fats_g, fiber_g
        FROM nutrition_days
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

async fn fetch_weekly(db: &Database, user_id: Uuid, limit_weeks: i64) -> AppResult<Vec<NutritionWeeklyRow>> {
    let rows = sqlx::query_as::<_, NutritionWeeklyRow>(
        r"
        SELECT
            date_trunc('week', date)::date AS week_start,
            avg(calories) AS avg_calories,
            avg(protein_g) AS avg_protein_g,
            avg(carbs_g) AS avg_carbs_g,
            avg(fats_g) AS avg_fats_g
        FROM nutrition_days
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

async fn fetch_monthly(db: &Database, user_id: Uuid, limit_months: i64) -> AppResult<Vec<NutritionMonthlyRow>> {
    let rows = sqlx::query_as::<_, NutritionMonthlyRow>(
        r"
        SELECT
            date_trunc('month', date)::date AS month_start,
            avg(calories) AS avg_calories,
            avg(protein_g) AS avg_protein_g,
            avg(carbs_g) AS avg_carbs_g,
            avg(fats_g) AS avg_fats_g,
            count(*) AS days_logged
        FROM nutrition_days
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

async fn latest_bodyweight(db: &Database, user_id: Uuid) -> AppResult<Option<f64>> {
    let row: Option<(f64,)> = sqlx::query_as(
        r"
        SELECT weight_kg FROM health_metric_daily
        WHERE user_id = $1 AND weight_kg IS NOT NULL
        ORDER BY date DESC
        LIMIT 1
        ",
    )
    .bind(user_id)
    .fetch_optional(db.pool())
    .await?;
    Ok(row.map(|(w,)| w))
}

/// Produce a bounded nutrition summary for the given scenario.
///
/// # Errors
///
/// Returns a database error if any underlying query fails.
pub async fn nutrition_summary(
    db: &Database,
    user_id: Uuid,
    scenario: NutritionScenario,
) -> AppResult<NutritionSummary> {
    let mut summary = NutritionSummary::default();

    match scenario {
        NutritionScenario::QuickCheck => {
            let daily = fetch_daily(db, user_id, caps::QUICK_CHECK_DAYS as i64).await?;
            summary.daily = enforce_cap(daily, caps::QUICK_CHECK_DAYS, "nutrition/quick_check");
        }
        NutritionScenario::Default => {
            let daily = fetch_daily(db, user_id, caps::DEFAULT_DAYS as i64).await?;
            let weekly = fetch_weekly(db, user_id, caps::DEFAULT_WEEKS as i64).await?;
            summary.daily = enforce_cap(daily, caps::DEFAULT_DAYS, "nutrition/default/daily");
            summary.weekly = enforce_cap(weekly, caps::DEFAULT_WEEKS, "nutrition/default/weekly");
        }
        NutritionScenario::Troubleshooting => {
            let daily = fetch_daily(db, user_id, caps::TROUBLESHOOTING_DAYS as i64).await?;
            let weekly = fetch_weekly(db, user_id, caps::TROUBLESHOOTING_WEEKS as i64).await?;
            let bodyweight = latest_bodyweight(db, user_id).await?;

            let avg_protein = if daily.is_empty() {
                0.0
            } else {
                daily.iter().map(|d| d.protein_g).sum::<f64>() / daily.len() as f64
            };
            summary.protein_per_kg_bodyweight = bodyweight.filter(|w| *w > 0.0).map(|w| avg_protein / w);
            summary.daily = enforce_cap(daily, caps::TROUBLESHOOTING_DAYS, "nutrition/troubleshooting/daily");
            summary.weekly = enforce_cap(weekly, caps::TROUBLESHOOTING_WEEKS, "nutrition/troubleshooting/weekly");
        }
        NutritionScenario::Historical => {
            let monthly = fetch_monthly(db, user_id, caps::HISTORICAL_MONTHS as i64).await?;
            summary.monthly = enforce_cap(monthly, caps::HISTORICAL_MONTHS, "nutrition/historical");
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforce_cap_truncates_oversized_output() {
        let rows: Vec<i32> = (0..10).collect();
        let capped = enforce_cap(rows, 7, "test");
        assert_eq!(capped.len(), 7);
    }
}
