// ABOUTME: Cross-domain correlation analysis over a date-aligned nutrition/health/workout series
// ABOUTME: Pure function producing a structured insights list; never calls the LLM
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Correlation / cross-domain analysis.

use serde::Serialize;

use crate::constants::correlation_thresholds::{MIN_PROTEIN_PER_KG, MIN_WORKOUTS_PER_WEEK, TARGET_PROTEIN_PER_KG};

/// One date-aligned day of cross-domain data.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationDay {
    pub calories: f64,
    pub protein_g: f64,
    pub bodyweight_kg: Option<f64>,
    pub workout_count: u32,
}

#[derive(Debug, Clone)]
pub struct CorrelationInput {
    pub days: Vec<CorrelationDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightType {
    InsufficientProtein,
    LowTrainingFrequency,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub severity: InsightSeverity,
    pub message: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationOutput {
    pub avg_calories: f64,
    pub avg_protein_g: f64,
    pub avg_bodyweight_kg: Option<f64>,
    pub protein_per_kg_bodyweight: Option<f64>,
    pub workouts_per_week: f64,
    pub insights: Vec<Insight>,
}

fn average(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

/// Run the cross-domain correlation analysis over a date-aligned series.
///
/// Deterministic and side-effect free: only summarises structured data for
/// the LLM to narrate, never invokes it.
#[must_use]
pub fn correlation_analysis(input: &CorrelationInput) -> CorrelationOutput {
    let days = &input.days;
    let span_days = days.len().max(1);

    let avg_calories = average(days.iter().map(|d| d.calories));
    let avg_protein_g = average(days.iter().map(|d| d.protein_g));

    let weights: Vec<f64> = days.iter().filter_map(|d| d.bodyweight_kg).collect();
    let avg_bodyweight_kg = if weights.is_empty() {
        None
    } else {
        Some(average(weights.into_iter()))
    };

    let protein_per_kg_bodyweight = avg_bodyweight_kg.filter(|w| *w > 0.0).map(|w| avg_protein_g / w);

    let total_workouts: u32 = days.iter().map(|d| d.workout_count).sum();
    let workouts_per_week = (f64::from(total_workouts) / span_days as f64) * 7.0;

    let mut insights = Vec::new();

    if let Some(ppk) = protein_per_kg_bodyweight {
        if ppk < MIN_PROTEIN_PER_KG {
            let avg_bodyweight_kg = avg_bodyweight_kg.unwrap_or(0.0);
            insights.push(Insight {
                insight_type: InsightType::InsufficientProtein,
                severity: InsightSeverity::High,
                message: format!(
                    "Average protein intake is {avg_protein_g:.0}g/day, {ppk:.2}g per kg bodyweight, below the {MIN_PROTEIN_PER_KG}g/kg threshold"
                ),
                recommendation: format!(
                    "Target roughly {:.0}g of protein per day ({TARGET_PROTEIN_PER_KG}g/kg at {avg_bodyweight_kg:.0}kg bodyweight)",
                    TARGET_PROTEIN_PER_KG * avg_bodyweight_kg
                ),
            });
        }
    }

    if workouts_per_week < MIN_WORKOUTS_PER_WEEK {
        insights.push(Insight {
            insight_type: InsightType::LowTrainingFrequency,
            severity: InsightSeverity::Medium,
            message: format!(
                "Training frequency is {workouts_per_week:.1} sessions/week, below the {MIN_WORKOUTS_PER_WEEK:.0}/week target"
            ),
            recommendation: "Add at least one more session per week, even a short one, to build momentum".to_string(),
        });
    }

    CorrelationOutput {
        avg_calories,
        avg_protein_g,
        avg_bodyweight_kg,
        protein_per_kg_bodyweight,
        workouts_per_week,
        insights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(calories: f64, protein_g: f64, bodyweight_kg: f64, workout_count: u32) -> CorrelationDay {
        CorrelationDay {
            calories,
            protein_g,
            bodyweight_kg: Some(bodyweight_kg),
            workout_count,
        }
    }

    #[test]
    fn protein_per_kg_exactly_at_threshold_is_not_flagged() {
        let input = CorrelationInput {
            days: vec![day(2200.0, 128.0, 80.0, 1); 7],
        };
        let output = correlation_analysis(&input);
        assert!((output.protein_per_kg_bodyweight.expect("bodyweight present") - 1.6).abs() < 1e-9);
        let insight = output
            .insights
            .iter()
            .find(|i| i.insight_type == InsightType::InsufficientProtein);
        assert!(insight.is_none(), "1.6 g/kg is exactly at the threshold, not below it");
    }

    #[test]
    fn protein_below_threshold_recommends_target_from_worked_example() {
        // avg protein 80g, avg bodyweight 80kg -> ~1.0 g/kg,
        // recommendation target ~= 1.8 * 80 = 144g.
        let input = CorrelationInput {
            days: vec![day(2000.0, 80.0, 80.0, 2); 7],
        };
        let output = correlation_analysis(&input);
        let insight = output
            .insights
            .iter()
            .find(|i| i.insight_type == InsightType::InsufficientProtein)
            .expect("below-threshold protein should produce an insight");
        assert_eq!(insight.severity, InsightSeverity::High);
        assert!(insight.recommendation.contains("144"));
    }

    #[test]
    fn low_frequency_flags_medium_severity() {
        let input = CorrelationInput {
            days: vec![day(2500.0, 160.0, 80.0, 0); 7],
        };
        let output = correlation_analysis(&input);
        assert!(output
            .insights
            .iter()
            .any(|i| i.insight_type == InsightType::LowTrainingFrequency && i.severity == InsightSeverity::Medium));
    }

    #[test]
    fn no_bodyweight_data_skips_protein_insight_without_panicking() {
        let input = CorrelationInput {
            days: vec![CorrelationDay {
                calories: 2000.0,
                protein_g: 50.0,
                bodyweight_kg: None,
                workout_count: 3,
            }],
        };
        let output = correlation_analysis(&input);
        assert!(output.protein_per_kg_bodyweight.is_none());
        assert!(output
            .insights
            .iter()
            .all(|i| i.insight_type != InsightType::InsufficientProtein));
    }
}
