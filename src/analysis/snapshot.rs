// ABOUTME: Holistic snapshot — composes the default scenario of all three shapers
// ABOUTME: Convenience tool for the agent's first turn in a new session
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Holistic snapshot.

use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::shapers::{
    health_summary, nutrition_summary, workout_summary, HealthScenario, HealthSummary, NutritionScenario,
    NutritionSummary, WorkoutScenario, WorkoutSummary,
};
use crate::storage::Database;

#[derive(Debug, Clone, Serialize)]
pub struct HolisticSnapshot {
    pub nutrition: NutritionSummary,
    pub workouts: WorkoutSummary,
    pub health: HealthSummary,
}

/// Compose the `default` scenario of each domain shaper into one response,
/// for the agent to load once at the start of a session instead of issuing
/// three separate tool calls.
///
/// # Errors
///
/// Returns a database error if any underlying shaper query fails.
pub async fn holistic_snapshot(db: &Database, user_id: Uuid) -> AppResult<HolisticSnapshot> {
    let nutrition = nutrition_summary(db, user_id, NutritionScenario::Default).await?;
    let workouts = workout_summary(db, user_id, WorkoutScenario::Default).await?;
    let health = health_summary(db, user_id, HealthScenario::Default).await?;

    Ok(HolisticSnapshot {
        nutrition,
        workouts,
        health,
    })
}
