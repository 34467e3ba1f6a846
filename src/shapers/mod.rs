// ABOUTME: Query shapers root — bounded-size aggregations safe for an LLM context window
// ABOUTME: One submodule per data domain; every scenario asserts its own row cap
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Query shapers.
//!
//! A shaper is a query function whose output size is bounded by design,
//! never proportional to history depth. Each named "scenario" selects a
//! pre-declared aggregation recipe; the row-count cap for a scenario is
//! asserted inside the shaper itself (`debug_assert!` plus a release-mode
//! truncation + warning), not only in tests, as the direct defence
//! against LLM context bloat.

pub mod health;
pub mod nutrition;
pub mod workout;

pub use health::{health_summary, HealthScenario, HealthSummary};
pub use nutrition::{nutrition_summary, NutritionScenario, NutritionSummary};
pub use workout::{workout_summary, WorkoutScenario, WorkoutSummary};

/// Enforce a row-count cap on a shaper's output, in every build profile.
///
/// `debug_assert!` alone would vanish in release builds, so a regression
/// would silently inflate the prompt instead of being caught. This helper
/// truncates and logs a warning if the cap is ever exceeded, so a bug
/// upstream degrades gracefully instead of blowing the agent's context
/// budget.
pub(crate) fn enforce_cap<T>(mut rows: Vec<T>, cap: usize, scenario: &str) -> Vec<T> {
    debug_assert!(
        rows.len() <= cap,
        "shaper scenario '{scenario}' exceeded its row cap ({} > {cap})",
        rows.len()
    );
    if rows.len() > cap {
        tracing::warn!(scenario, cap, actual = rows.len(), "shaper row cap exceeded, truncating");
        rows.truncate(cap);
    }
    rows
}
