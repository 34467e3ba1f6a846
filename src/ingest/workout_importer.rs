// ABOUTME: Pure transform from tracker-supplied workout JSON into WorkoutCache rows
// ABOUTME: No I/O here — fetching the objects is tracker_client's job
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Tracker-workout importer.
//!
//! Consumes the `JSON` workout objects `tracker_client` returns from the
//! tracker's `get_workouts`/`get_workout` tools and derives the
//! [`WorkoutCache`] projection this system persists locally. Expected
//! shape per workout (tolerant of extra fields, which pass through
//! untouched into `raw_payload`):
//!
//! ```json
//! {
//!   "id": "ext-123",
//!   "date": "2026-01-01T08:00:00Z",
//!   "title": "Push Day",
//!   "exercises": [
//!     { "muscle_group": "chest",
//!       "sets": [{ "weight_kg": 80.0, "reps": 8, "warmup": false }, ...] }
//!   ]
//! }
//! ```
//!
//! `total_sets`/`total_volume` count only non-warmup sets; a set missing
//! `weight_kg` or `reps` contributes zero volume but still counts toward
//! `total_sets`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::WorkoutCache;
use crate::storage::normalize::{clean_f64_or_zero, to_utc, Normalize};

impl Normalize for WorkoutCache {
    fn normalized(self) -> Self {
        Self {
            workout_date: to_utc(self.workout_date),
            total_volume: clean_f64_or_zero(self.total_volume),
            ..self
        }
    }
}

fn set_volume(set: &Value) -> (i32, f64) {
    if set.get("warmup").and_then(Value::as_bool).unwrap_or(false) {
        return (0, 0.0);
    }
    let weight = set.get("weight_kg").and_then(Value::as_f64).unwrap_or(0.0);
    let reps = set.get("reps").and_then(Value::as_f64).unwrap_or(0.0);
    (1, weight * reps)
}

fn workout_to_cache(user_id: Uuid, workout: &Value) -> AppResult<WorkoutCache> {
    let external_workout_id = workout
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::parse("workout object missing 'id'"))?
        .to_string();
    let date_str = workout
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::parse("workout object missing 'date'"))?;
    let workout_date: DateTime<Utc> = date_str
        .parse()
        .map_err(|e| AppError::parse(format!("unrecognized workout date '{date_str}': {e}")))?;
    let title = workout
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled workout")
        .to_string();

    let exercises = workout.get("exercises").and_then(Value::as_array);
    let mut total_sets = 0i32;
    let mut total_volume = 0.0f64;
    let mut muscle_groups: Vec<String> = Vec::new();

    if let Some(exercises) = exercises {
        for exercise in exercises {
            if let Some(group) = exercise.get("muscle_group").and_then(Value::as_str) {
                if !muscle_groups.iter().any(|g| g == group) {
                    muscle_groups.push(group.to_string());
                }
            }
            if let Some(sets) = exercise.get("sets").and_then(Value::as_array) {
                for set in sets {
                    let (count, volume) = set_volume(set);
                    total_sets += count;
                    total_volume += volume;
                }
            }
        }
    }

    Ok(WorkoutCache {
        user_id,
        external_workout_id,
        workout_date,
        title,
        total_sets,
        total_volume,
        muscle_groups: sqlx::types::Json(muscle_groups),
        raw_payload: sqlx::types::Json(workout.clone()),
        updated_at: Utc::now(),
    }
    .normalized())
}

/// Transform tracker workout objects into [`WorkoutCache`] rows.
///
/// A malformed individual workout does not abort the batch — its error is
/// yielded in place so the caller can decide whether to persist the rest
/// (the upsert service's per-batch transaction already makes that an
/// all-or-nothing decision downstream).
///
/// # Errors
///
/// Each yielded item is independently `Result`; the function itself never
/// fails.
pub fn import_tracker_workouts<'a>(
    user_id: Uuid,
    workouts: &'a [Value],
) -> impl Iterator<Item = AppResult<WorkoutCache>> + 'a {
    workouts.iter().map(move |w| workout_to_cache(user_id, w))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workout() -> Value {
        serde_json::json!({
            "id": "ext-1",
            "date": "2026-01-01T08:00:00Z",
            "title": "Push Day",
            "exercises": [
                {
                    "muscle_group": "chest",
                    "sets": [
                        {"weight_kg": 80.0, "reps": 8, "warmup": false},
                        {"weight_kg": 40.0, "reps": 15, "warmup": true}
                    ]
                },
                {
                    "muscle_group": "triceps",
                    "sets": [{"weight_kg": 30.0, "reps": 10, "warmup": false}]
                }
            ]
        })
    }

    #[test]
    fn computes_sets_volume_and_muscle_groups_excluding_warmups() {
        let user_id = Uuid::new_v4();
        let workout = sample_workout();
        let cache = workout_to_cache(user_id, &workout).unwrap();
        assert_eq!(cache.total_sets, 2);
        assert_eq!(cache.total_volume, 80.0 * 8.0 + 30.0 * 10.0);
        assert_eq!(cache.muscle_groups.0, vec!["chest", "triceps"]);
    }

    #[test]
    fn missing_id_is_a_parse_error() {
        let workout = serde_json::json!({"date": "2026-01-01T08:00:00Z"});
        let err = workout_to_cache(Uuid::new_v4(), &workout).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ParseError);
    }

    #[test]
    fn bad_workout_does_not_abort_the_rest_of_the_batch() {
        let workouts = vec![serde_json::json!({"date": "2026-01-01T08:00:00Z"}), sample_workout()];
        let results: Vec<_> = import_tracker_workouts(Uuid::new_v4(), &workouts).collect();
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }
}
