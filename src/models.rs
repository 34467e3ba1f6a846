// ABOUTME: Persisted data model entities shared across storage, shapers and the agent
// ABOUTME: One struct per persisted entity
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Data model.
//!
//! Every struct here corresponds 1:1 to a table created by a migration
//! under `migrations/`. JSONB columns are carried as `serde_json::Value`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user of the system. Single- or multi-user per deployment; every other
/// row is owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A durable container for one conversational thread.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// The role of a `ChatMessage` sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry in a tool-call log attached to an assistant `ChatMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    /// Short digest of the result, not the full payload, to keep the log compact.
    pub result_digest: String,
}

/// A single message within a `ChatSession`.
///
/// Invariant: within a session, messages are totally ordered by
/// `created_at`; at most one assistant message is written per assistant
/// turn regardless of tool-call count.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub token_count: i32,
    /// `NULL` unless the message is an assistant turn that invoked tools.
    pub tool_calls: Option<sqlx::types::Json<Vec<ToolCallRecord>>>,
    /// Reserved for a future semantic-retrieval index; never
    /// populated by this core.
    pub embedding: Option<sqlx::types::Json<serde_json::Value>>,
}

/// Daily nutrition totals, keyed by (user, date). Scalars are extracted
/// projections of the source export; `raw` preserves every column.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutritionDay {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub fiber_g: f64,
    pub raw: sqlx::types::Json<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// A single time-series health-metric observation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthMetricRaw {
    pub user_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub metric_type: String,
    pub source: String,
    pub value: f64,
    pub unit: String,
    pub metadata: sqlx::types::Json<serde_json::Value>,
}

/// Pre-aggregated daily health metrics, recomputable from `HealthMetricRaw`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct HealthMetricDaily {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub steps: Option<i64>,
    pub weight_kg: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub active_calories: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub other_metrics: sqlx::types::Json<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl HealthMetricDaily {
    #[must_use]
    pub fn empty(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            other_metrics: sqlx::types::Json(serde_json::json!({})),
            ..Self::default_for(user_id, date)
        }
    }

    fn default_for(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            steps: None,
            weight_kg: None,
            sleep_hours: None,
            active_calories: None,
            resting_heart_rate: None,
            other_metrics: sqlx::types::Json(serde_json::json!({})),
            updated_at: Utc::now(),
        }
    }
}

/// Fully derived weekly summary, regenerated on demand.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthWeeklySummary {
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub avg_steps: Option<f64>,
    pub avg_weight_kg: Option<f64>,
    pub avg_sleep_hours: Option<f64>,
    pub avg_active_calories: Option<f64>,
    pub weight_delta_kg: Option<f64>,
}

/// Local cache of an externally-owned workout, keyed by (user, external id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutCache {
    pub user_id: Uuid,
    pub external_workout_id: String,
    pub workout_date: DateTime<Utc>,
    pub title: String,
    pub total_sets: i32,
    /// Total volume in mass units (Σ weight × reps across working sets).
    pub total_volume: f64,
    pub muscle_groups: sqlx::types::Json<Vec<String>>,
    pub raw_payload: sqlx::types::Json<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// The kind of goal a `UserGoals` row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Strength,
    BodyComposition,
    Endurance,
    Habit,
}

/// One active goals record per (user, kind).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserGoals {
    pub user_id: Uuid,
    pub kind: GoalKind,
    pub target: sqlx::types::Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One preferences record per user: training targets, equipment, injuries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub allowed_equipment: sqlx::types::Json<Vec<String>>,
    pub disliked_exercises: sqlx::types::Json<Vec<String>>,
    pub injury_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// The data feed a `SyncMetadata` row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SyncSource {
    NutritionScrape,
    HealthUpload,
    TrackerPull,
}

/// The outcome of the most recent sync attempt for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Success,
    Partial,
    Failed,
}

/// One row per (user, source); tracks last-attempt metadata for the
/// alerting pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncMetadata {
    pub user_id: Uuid,
    pub source: SyncSource,
    pub last_attempt_at: DateTime<Utc>,
    pub last_outcome: SyncOutcome,
    pub records_synced: i64,
    pub error_message: Option<String>,
}
