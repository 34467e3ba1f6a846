// ABOUTME: Local tool trait, registry, and the concrete tools the coaching agent can call
// ABOUTME: An explicit list-literal tool registry built once at startup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Agent tool surface.
//!
//! This system has one caller (its own agent loop) and a small, fixed tool
//! surface, so the registry is kept simple: a small `Tool` trait and a
//! registry built once at startup from a list literal, rather than a
//! decorator/factory SPI meant for a server exposing dozens of tools to
//! arbitrary external clients.
//!
//! Two kinds of tool exist side by side:
//! - **Local** tools run in-process against the database and the pure
//!   analysis functions.
//! - **`mcp__tracker__*`** tools route to the external tracker's MCP
//!   tool-server through [`TrackerClient`]; the namespace
//!   prefix is the dispatch key, not a string-matched special case buried
//!   in the runtime loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::{
    correlation_analysis, detect_plateau, holistic_snapshot, CorrelationDay, CorrelationInput, PlateauSession,
    PlateauWindowMode,
};
use crate::errors::{AppError, AppResult};
use crate::models::GoalKind;
use crate::shapers::{
    health_summary, nutrition_summary, workout_summary, HealthScenario, NutritionScenario, WorkoutScenario,
};
use crate::storage::goals;
use crate::storage::Database;
use crate::tracker_client::TrackerClient;

use super::llm::ToolDefinition;

/// Prefix routing tool names to the external tracker.
pub const TRACKER_NAMESPACE: &str = "mcp__tracker__";

/// Everything one tool invocation needs, independent of which tool it is:
/// a database handle, the tracker client, and the identifiers of the
/// user and session the call belongs to.
#[derive(Clone)]
pub struct RunContext {
    pub db: Database,
    pub tracker: TrackerClient,
    pub user_id: Uuid,
    pub session_id: Uuid,
}

/// One callable tool. Deliberately small:
/// no capability bitflags, no tenant/auth checks — every tool here runs
/// for the one user the chat session belongs to.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;

    /// Run the tool.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` (or a more specific taxonomy entry) if the
    /// underlying operation fails.
    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value>;
}

/// Where a tool name dispatches to.
pub enum ToolRoute {
    Local(Arc<dyn Tool>),
    /// Carries the tracker-side tool name with the namespace prefix
    /// already stripped.
    McpTracker(String),
}

/// Explicit tool registry, built once at startup.
pub struct ToolRegistry {
    local: HashMap<&'static str, Arc<dyn Tool>>,
    tracker_defs: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Build the registry from the fixed set of local tools plus the
    /// tracker's known tool surface.
    #[must_use]
    pub fn new() -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(HolisticSnapshotTool),
            Arc::new(NutritionSummaryTool),
            Arc::new(WorkoutSummaryTool),
            Arc::new(HealthSummaryTool),
            Arc::new(PlateauCheckTool),
            Arc::new(CorrelationAnalysisTool),
            Arc::new(ListGoalsTool),
            Arc::new(SetGoalTool),
            Arc::new(GetPreferencesTool),
            Arc::new(SetPreferencesTool),
        ];

        let local = tools.into_iter().map(|t| (t.name(), t)).collect();

        Self {
            local,
            tracker_defs: tracker_tool_definitions(),
        }
    }

    /// Resolve a tool name (local or `mcp__tracker__`-namespaced) to its
    /// dispatch target.
    #[must_use]
    pub fn route(&self, name: &str) -> Option<ToolRoute> {
        if let Some(suffix) = name.strip_prefix(TRACKER_NAMESPACE) {
            return self
                .tracker_defs
                .iter()
                .any(|d| d.name == suffix)
                .then(|| ToolRoute::McpTracker(suffix.to_string()));
        }
        self.local.get(name).cloned().map(ToolRoute::Local)
    }

    /// All tool schemas to advertise to the model this turn.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .local
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.extend(self.tracker_defs.iter().cloned());
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool schemas for the tracker's `JSON`-RPC surface. These
/// are declared statically rather than discovered per turn: this system
/// calls the tracker in short ephemeral sessions, so querying `list_tools` on every
/// turn just to redescribe a fixed surface would be wasted round trips.
fn tracker_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}get_workouts"),
            description: "Fetch workouts recorded in the external tracker since a given timestamp.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "since": {"type": "string", "format": "date-time"}
                },
                "required": ["since"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}create_routine"),
            description: "Create a new workout routine in the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "exercises": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "sets": {"type": "integer"},
                                "target_reps": {"type": "string"}
                            },
                            "required": ["name", "sets"]
                        }
                    }
                },
                "required": ["name", "exercises"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}update_routine"),
            description: "Update an existing workout routine's exercises in the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "routine_id": {"type": "string"},
                    "exercises": {"type": "array"}
                },
                "required": ["routine_id", "exercises"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}get_workout"),
            description: "Fetch a single workout from the external tracker by its id.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workout_id": {"type": "string"}
                },
                "required": ["workout_id"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}get_workout_count"),
            description: "Return the total number of workouts recorded in the external tracker.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}get_workout_events"),
            description: "Fetch workout create/update/delete events in the external tracker since a given timestamp, \
                          for catching up on changes without re-fetching everything."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "since": {"type": "string", "format": "date-time"}
                },
                "required": ["since"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}list_routines"),
            description: "List workout routines stored in the external tracker, paginated.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer"},
                    "page_size": {"type": "integer"}
                }
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}get_routine"),
            description: "Fetch a single workout routine from the external tracker by its id.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "routine_id": {"type": "string"}
                },
                "required": ["routine_id"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}list_exercise_templates"),
            description: "List the exercise templates known to the external tracker, paginated.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer"},
                    "page_size": {"type": "integer"}
                }
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}list_routine_folders"),
            description: "List the routine folders in the external tracker.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}create_routine_folder"),
            description: "Create a new routine folder in the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"}
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}update_routine_folder"),
            description: "Rename an existing routine folder in the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "folder_id": {"type": "string"},
                    "name": {"type": "string"}
                },
                "required": ["folder_id", "name"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}delete_routine_folder"),
            description: "Delete a routine folder in the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "folder_id": {"type": "string"}
                },
                "required": ["folder_id"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}list_webhooks"),
            description: "List the webhook subscriptions registered with the external tracker.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}create_webhook"),
            description: "Register a new webhook subscription with the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"}
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: format!("{TRACKER_NAMESPACE}delete_webhook"),
            description: "Remove a webhook subscription from the external tracker.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "webhook_id": {"type": "string"}
                },
                "required": ["webhook_id"]
            }),
        },
    ]
}

// ============================================================================
// Local tools
// ============================================================================

fn scenario_arg(args: &Value) -> &str {
    args.get("scenario").and_then(Value::as_str).unwrap_or("default")
}

fn parse_nutrition_scenario(s: &str) -> AppResult<NutritionScenario> {
    match s {
        "quick_check" => Ok(NutritionScenario::QuickCheck),
        "default" => Ok(NutritionScenario::Default),
        "troubleshooting" => Ok(NutritionScenario::Troubleshooting),
        "historical" => Ok(NutritionScenario::Historical),
        other => Err(AppError::new(
            crate::errors::ErrorCode::InvalidInput,
            format!("unknown nutrition scenario '{other}'"),
        )),
    }
}

fn parse_workout_scenario(s: &str) -> AppResult<WorkoutScenario> {
    match s {
        "quick_check" => Ok(WorkoutScenario::QuickCheck),
        "default" => Ok(WorkoutScenario::Default),
        "troubleshooting" => Ok(WorkoutScenario::Troubleshooting),
        "historical" => Ok(WorkoutScenario::Historical),
        other => Err(AppError::new(
            crate::errors::ErrorCode::InvalidInput,
            format!("unknown workout scenario '{other}'"),
        )),
    }
}

fn parse_health_scenario(s: &str) -> AppResult<HealthScenario> {
    match s {
        "quick_check" => Ok(HealthScenario::QuickCheck),
        "default" => Ok(HealthScenario::Default),
        "troubleshooting" => Ok(HealthScenario::Troubleshooting),
        "historical" => Ok(HealthScenario::Historical),
        other => Err(AppError::new(
            crate::errors::ErrorCode::InvalidInput,
            format!("unknown health scenario '{other}'"),
        )),
    }
}

fn scenario_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "scenario": {
                "type": "string",
                "enum": ["quick_check", "default", "troubleshooting", "historical"],
                "description": description
            }
        }
    })
}

struct HolisticSnapshotTool;

#[async_trait]
impl Tool for HolisticSnapshotTool {
    fn name(&self) -> &'static str {
        "holistic_snapshot"
    }

    fn description(&self) -> &'static str {
        "Load a default-scenario snapshot across nutrition, workouts, and health metrics in one call. \
         Call this at the start of a new session before narrower tools."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, ctx: &RunContext, _args: Value) -> AppResult<Value> {
        let snapshot = holistic_snapshot(&ctx.db, ctx.user_id).await?;
        serde_json::to_value(snapshot).map_err(|e| AppError::internal(format!("failed to serialize snapshot: {e}")))
    }
}

struct NutritionSummaryTool;

#[async_trait]
impl Tool for NutritionSummaryTool {
    fn name(&self) -> &'static str {
        "nutrition_summary"
    }

    fn description(&self) -> &'static str {
        "Bounded nutrition summary for one named scenario: quick_check (7 days), default (30 days + \
         12 weekly averages), troubleshooting (adds protein-per-kg-bodyweight), or historical (36 \
         monthly aggregates)."
    }

    fn input_schema(&self) -> Value {
        scenario_schema("Which aggregation recipe to run.")
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let scenario = parse_nutrition_scenario(scenario_arg(&args))?;
        let summary = nutrition_summary(&ctx.db, ctx.user_id, scenario).await?;
        serde_json::to_value(summary).map_err(|e| AppError::internal(format!("failed to serialize summary: {e}")))
    }
}

struct WorkoutSummaryTool;

#[async_trait]
impl Tool for WorkoutSummaryTool {
    fn name(&self) -> &'static str {
        "workout_summary"
    }

    fn description(&self) -> &'static str {
        "Bounded workout summary for one named scenario: quick_check (7 most recent workouts), default \
         (12 weekly volumes + top 5 exercises), troubleshooting (adds 10 recent workouts + top 8 \
         exercises), or historical (36 monthly aggregates)."
    }

    fn input_schema(&self) -> Value {
        scenario_schema("Which aggregation recipe to run.")
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let scenario = parse_workout_scenario(scenario_arg(&args))?;
        let summary = workout_summary(&ctx.db, ctx.user_id, scenario).await?;
        serde_json::to_value(summary).map_err(|e| AppError::internal(format!("failed to serialize summary: {e}")))
    }
}

struct HealthSummaryTool;

#[async_trait]
impl Tool for HealthSummaryTool {
    fn name(&self) -> &'static str {
        "health_summary"
    }

    fn description(&self) -> &'static str {
        "Bounded health-metric summary (steps, weight, sleep, active calories, resting heart rate) for \
         one named scenario: quick_check, default, troubleshooting, or historical."
    }

    fn input_schema(&self) -> Value {
        scenario_schema("Which aggregation recipe to run.")
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let scenario = parse_health_scenario(scenario_arg(&args))?;
        let summary = health_summary(&ctx.db, ctx.user_id, scenario).await?;
        serde_json::to_value(summary).map_err(|e| AppError::internal(format!("failed to serialize summary: {e}")))
    }
}

struct PlateauCheckTool;

#[async_trait]
impl Tool for PlateauCheckTool {
    fn name(&self) -> &'static str {
        "plateau_check"
    }

    fn description(&self) -> &'static str {
        "Check one named exercise's recent session history for a training plateau or a weight-loss \
         regression, with a fixed set of recommendations for whichever applies."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "exercise_name": {"type": "string"},
                "lookback_sessions": {"type": "integer", "description": "Defaults to 12."},
                "lookback_weeks": {"type": "integer", "description": "Window size passed to the plateau rule; defaults to 8."}
            },
            "required": ["exercise_name"]
        })
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let exercise_name = args
            .get("exercise_name")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::new(crate::errors::ErrorCode::InvalidInput, "exercise_name is required"))?;
        let lookback_sessions = args.get("lookback_sessions").and_then(Value::as_i64).unwrap_or(12);
        let lookback_weeks = args.get("lookback_weeks").and_then(Value::as_i64).unwrap_or(8);

        let sessions = crate::shapers::workout::exercise_progression(&ctx.db, ctx.user_id, exercise_name, lookback_sessions)
            .await?;
        let mapped: Vec<PlateauSession> = sessions
            .into_iter()
            .map(|s| PlateauSession {
                date: s.date,
                max_weight_kg: s.max_weight_kg,
            })
            .collect();

        let result = detect_plateau(&mapped, lookback_weeks, PlateauWindowMode::from_env());
        serde_json::to_value(result).map_err(|e| AppError::internal(format!("failed to serialize result: {e}")))
    }
}

struct CorrelationAnalysisTool;

#[async_trait]
impl Tool for CorrelationAnalysisTool {
    fn name(&self) -> &'static str {
        "correlation_analysis"
    }

    fn description(&self) -> &'static str {
        "Cross-domain analysis over the trailing lookback window: average calories/protein, protein \
         per kg bodyweight, workouts per week, and any insights those numbers cross a threshold for."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lookback_days": {"type": "integer", "description": "Defaults to 28."}
            }
        })
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let lookback_days = args.get("lookback_days").and_then(Value::as_i64).unwrap_or(28);
        let input = load_correlation_input(&ctx.db, ctx.user_id, lookback_days).await?;
        let output = correlation_analysis(&input);
        serde_json::to_value(output).map_err(|e| AppError::internal(format!("failed to serialize output: {e}")))
    }
}

/// Assemble a date-aligned [`CorrelationInput`] by joining nutrition,
/// health, and workout-count rows over `lookback_days` in Rust rather
/// than in one SQL query, so the three source tables stay independent
/// of each other's schema.
async fn load_correlation_input(db: &Database, user_id: Uuid, lookback_days: i64) -> AppResult<CorrelationInput> {
    let nutrition: Vec<(NaiveDate, f64, f64)> = sqlx::query_as(
        r"
        SELECT date, calories, protein_g FROM nutrition_days
        WHERE user_id = $1 ORDER BY date DESC LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(lookback_days)
    .fetch_all(db.pool())
    .await?;

    let weights: Vec<(NaiveDate, Option<f64>)> = sqlx::query_as(
        r"
        SELECT date, weight_kg FROM health_metric_daily
        WHERE user_id = $1 ORDER BY date DESC LIMIT $2
        ",
    )
    .bind(user_id)
    .bind(lookback_days)
    .fetch_all(db.pool())
    .await?;
    let weight_by_date: HashMap<NaiveDate, f64> = weights.into_iter().filter_map(|(d, w)| w.map(|w| (d, w))).collect();

    let workout_counts: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r"
        SELECT workout_date::date AS d, count(*) FROM workout_cache
        WHERE user_id = $1 AND workout_date >= now() - ($2 || ' days')::interval
        GROUP BY d
        ",
    )
    .bind(user_id)
    .bind(lookback_days.to_string())
    .fetch_all(db.pool())
    .await?;
    let workouts_by_date: HashMap<NaiveDate, i64> = workout_counts.into_iter().collect();

    let days = nutrition
        .into_iter()
        .map(|(date, calories, protein_g)| CorrelationDay {
            calories,
            protein_g,
            bodyweight_kg: weight_by_date.get(&date).copied(),
            workout_count: workouts_by_date.get(&date).copied().unwrap_or(0) as u32,
        })
        .collect();

    Ok(CorrelationInput { days })
}

struct ListGoalsTool;

#[async_trait]
impl Tool for ListGoalsTool {
    fn name(&self) -> &'static str {
        "list_goals"
    }

    fn description(&self) -> &'static str {
        "List the user's active goals, one per kind (strength, body_composition, endurance, habit)."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, ctx: &RunContext, _args: Value) -> AppResult<Value> {
        let rows = goals::list_goals(&ctx.db, ctx.user_id).await?;
        serde_json::to_value(rows).map_err(|e| AppError::internal(format!("failed to serialize goals: {e}")))
    }
}

struct SetGoalTool;

#[async_trait]
impl Tool for SetGoalTool {
    fn name(&self) -> &'static str {
        "set_goal"
    }

    fn description(&self) -> &'static str {
        "Set (insert or replace) the user's active goal for one kind. `target` is a free-form JSON \
         object describing the target (e.g. {\"exercise\": \"Squat\", \"target_weight_kg\": 140})."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": {"type": "string", "enum": ["strength", "body_composition", "endurance", "habit"]},
                "target": {"type": "object"}
            },
            "required": ["kind", "target"]
        })
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let kind = parse_goal_kind(args.get("kind").and_then(Value::as_str).unwrap_or_default())?;
        let target = args.get("target").cloned().unwrap_or_else(|| json!({}));
        let row = goals::set_goal(&ctx.db, ctx.user_id, kind, target).await?;
        serde_json::to_value(row).map_err(|e| AppError::internal(format!("failed to serialize goal: {e}")))
    }
}

fn parse_goal_kind(s: &str) -> AppResult<GoalKind> {
    match s {
        "strength" => Ok(GoalKind::Strength),
        "body_composition" => Ok(GoalKind::BodyComposition),
        "endurance" => Ok(GoalKind::Endurance),
        "habit" => Ok(GoalKind::Habit),
        other => Err(AppError::new(crate::errors::ErrorCode::InvalidInput, format!("unknown goal kind '{other}'"))),
    }
}

struct GetPreferencesTool;

#[async_trait]
impl Tool for GetPreferencesTool {
    fn name(&self) -> &'static str {
        "get_preferences"
    }

    fn description(&self) -> &'static str {
        "Fetch the user's training preferences: allowed equipment, disliked exercises, and injury notes."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, ctx: &RunContext, _args: Value) -> AppResult<Value> {
        let row = goals::get_preferences(&ctx.db, ctx.user_id).await?;
        serde_json::to_value(row).map_err(|e| AppError::internal(format!("failed to serialize preferences: {e}")))
    }
}

struct SetPreferencesTool;

#[async_trait]
impl Tool for SetPreferencesTool {
    fn name(&self) -> &'static str {
        "set_preferences"
    }

    fn description(&self) -> &'static str {
        "Replace the user's training preferences: allowed equipment, disliked exercises, injury notes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "allowed_equipment": {"type": "array", "items": {"type": "string"}},
                "disliked_exercises": {"type": "array", "items": {"type": "string"}},
                "injury_notes": {"type": "string"}
            }
        })
    }

    async fn invoke(&self, ctx: &RunContext, args: Value) -> AppResult<Value> {
        let allowed_equipment = string_array(&args, "allowed_equipment");
        let disliked_exercises = string_array(&args, "disliked_exercises");
        let injury_notes = args.get("injury_notes").and_then(Value::as_str).map(str::to_owned);

        let row = goals::upsert_preferences(&ctx.db, ctx.user_id, allowed_equipment, disliked_exercises, injury_notes)
            .await?;
        serde_json::to_value(row).map_err(|e| AppError::internal(format!("failed to serialize preferences: {e}")))
    }
}

fn string_array(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

/// Invoke a tracker-routed tool through its ephemeral MCP session.
///
/// # Errors
///
/// Propagates [`TrackerClient::call_tool`] errors.
pub async fn invoke_tracker_tool(ctx: &RunContext, tracker_tool_name: &str, arguments: Value) -> AppResult<Value> {
    ctx.tracker.call_tool(tracker_tool_name, arguments).await
}

/// Digest a tool result down to a short string for `ToolCallRecord`.
#[must_use]
pub fn digest_result(result: &Value) -> String {
    let rendered = result.to_string();
    const MAX_LEN: usize = 240;
    if rendered.len() <= MAX_LEN {
        rendered
    } else {
        let mut truncated: String = rendered.chars().take(MAX_LEN).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_strips_tracker_namespace() {
        let registry = ToolRegistry::new();
        match registry.route("mcp__tracker__get_workouts") {
            Some(ToolRoute::McpTracker(name)) => assert_eq!(name, "get_workouts"),
            _ => panic!("expected a tracker route"),
        }
    }

    #[test]
    fn route_resolves_local_tools() {
        let registry = ToolRegistry::new();
        assert!(matches!(registry.route("holistic_snapshot"), Some(ToolRoute::Local(_))));
    }

    #[test]
    fn route_rejects_unknown_tracker_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.route("mcp__tracker__delete_everything").is_none());
    }

    #[test]
    fn route_rejects_unknown_local_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.route("not_a_real_tool").is_none());
    }

    #[test]
    fn digest_result_truncates_long_payloads() {
        let big = Value::String("x".repeat(1000));
        let digest = digest_result(&big);
        assert!(digest.chars().count() <= 241);
    }

    #[test]
    fn definitions_are_sorted_and_include_tracker_tools() {
        let registry = ToolRegistry::new();
        let defs = registry.definitions();
        assert!(defs.iter().any(|d| d.name == "mcp__tracker__get_workouts"));
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}
