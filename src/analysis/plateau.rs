// ABOUTME: Plateau detection — pure function over one exercise's session progression
// ABOUTME: Deterministic: same progression + window → byte-identical verdict
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Plateau detection.

use chrono::NaiveDate;
use serde::Serialize;

use crate::constants::plateau::{MIN_SESSIONS, REGRESSION_RATIO, STAGNANT_TAIL};

/// One training session's contribution to a progression series.
#[derive(Debug, Clone, Copy)]
pub struct PlateauSession {
    pub date: NaiveDate,
    pub max_weight_kg: f64,
}

/// Resolves the "3 sessions" vs "3 weeks" ambiguity.
/// The default is session-counted; `Weeks` is the escape
/// hatch (`PLATEAU_WINDOW_MODE=weeks`) for callers who want calendar
/// weeks instead of raw session count when training frequency varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateauWindowMode {
    Sessions,
    Weeks,
}

impl PlateauWindowMode {
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("PLATEAU_WINDOW_MODE").as_deref() {
            Ok("weeks") => Self::Weeks,
            _ => Self::Sessions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateauKind {
    Stagnant,
    Regression,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlateauResult {
    pub is_plateau: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<PlateauKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weeks_stagnant: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_loss_pct: Option<f64>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub insufficient_data: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl PlateauResult {
    fn insufficient() -> Self {
        Self {
            is_plateau: false,
            kind: None,
            weeks_stagnant: None,
            current_max: None,
            weight_loss_pct: None,
            recommendations: Vec::new(),
            insufficient_data: true,
        }
    }

    fn no_plateau(current_max: f64) -> Self {
        Self {
            is_plateau: false,
            kind: None,
            weeks_stagnant: None,
            current_max: Some(current_max),
            weight_loss_pct: None,
            recommendations: Vec::new(),
            insufficient_data: false,
        }
    }
}

fn recommendations_for(kind: PlateauKind) -> Vec<String> {
    match kind {
        PlateauKind::Stagnant => vec![
            "Introduce a deload week, then add 2.5-5kg on your next working sets".to_string(),
            "Add an extra back-off set at a lighter load to build volume without grinding".to_string(),
            "Vary rep ranges for 2-3 weeks before returning to the original scheme".to_string(),
            "Audit recovery: sleep, protein intake, and inter-session rest days".to_string(),
        ],
        PlateauKind::Regression => vec![
            "Check for accumulated fatigue and consider a deload before pushing load again".to_string(),
            "Review recent sleep and nutrition logs for a correlated dip".to_string(),
            "Confirm technique hasn't drifted; film a set at a lighter load".to_string(),
            "Reduce working weight 10% and rebuild over 2-3 sessions before retesting the max".to_string(),
        ],
    }
}

/// Select the sessions within the lookback window, most recent first in
/// the input, returned oldest-first for the rules below to read
/// naturally ("first" = oldest in window, "last" = most recent).
fn window_sessions(sessions: &[PlateauSession], lookback_weeks: i64, mode: PlateauWindowMode) -> Vec<PlateauSession> {
    let mut ordered: Vec<PlateauSession> = sessions.to_vec();
    ordered.sort_by_key(|s| s.date);

    match mode {
        PlateauWindowMode::Sessions => {
            let window_len = (lookback_weeks as usize).max(MIN_SESSIONS);
            let start = ordered.len().saturating_sub(window_len);
            ordered[start..].to_vec()
        }
        PlateauWindowMode::Weeks => {
            let Some(last) = ordered.last() else {
                return Vec::new();
            };
            let cutoff = last.date - chrono::Duration::weeks(lookback_weeks);
            ordered.into_iter().filter(|s| s.date > cutoff).collect()
        }
    }
}

/// Detect a plateau or regression in one exercise's progression.
///
/// `sessions` need not be sorted; this function sorts by date internally.
/// Pure and deterministic: identical input always yields an identical
/// result, with no clock reads.
#[must_use]
pub fn detect_plateau(sessions: &[PlateauSession], lookback_weeks: i64, mode: PlateauWindowMode) -> PlateauResult {
    let window = window_sessions(sessions, lookback_weeks, mode);

    if window.len() < MIN_SESSIONS {
        return PlateauResult::insufficient();
    }

    let current_max = window.iter().map(|s| s.max_weight_kg).fold(f64::MIN, f64::max);
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return PlateauResult::insufficient();
    };

    let is_regression = last.max_weight_kg <= REGRESSION_RATIO * first.max_weight_kg;

    // Stagnant looks only at the trailing STAGNANT_TAIL sessions, independent
    // of the rest of the lookback window — this is what lets both rules fire
    // together (a flat recent tail well below an earlier peak is both a
    // plateau in the short term and a regression against the window).
    let tail_start = window.len().saturating_sub(STAGNANT_TAIL);
    let tail = &window[tail_start..];
    let tail_max = tail.iter().map(|s| s.max_weight_kg).fold(f64::MIN, f64::max);
    let tail_min = tail.iter().map(|s| s.max_weight_kg).fold(f64::MAX, f64::min);
    let is_stagnant = (tail_max - tail_min).abs() < f64::EPSILON;

    // Tie-break: regression wins over stagnant if both apply.
    if is_regression {
        let weight_loss_pct = ((first.max_weight_kg - last.max_weight_kg) / first.max_weight_kg) * 100.0;
        return PlateauResult {
            is_plateau: true,
            kind: Some(PlateauKind::Regression),
            weeks_stagnant: None,
            current_max: Some(current_max),
            weight_loss_pct: Some(weight_loss_pct),
            recommendations: recommendations_for(PlateauKind::Regression),
            insufficient_data: false,
        };
    }

    if is_stagnant {
        return PlateauResult {
            is_plateau: true,
            kind: Some(PlateauKind::Stagnant),
            weeks_stagnant: Some(STAGNANT_TAIL as i64),
            current_max: Some(current_max),
            weight_loss_pct: None,
            recommendations: recommendations_for(PlateauKind::Stagnant),
            insufficient_data: false,
        };
    }

    PlateauResult::no_plateau(current_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(day: u32, weight: f64) -> PlateauSession {
        PlateauSession {
            date: NaiveDate::from_ymd_opt(2026, 1, day).expect("valid date"),
            max_weight_kg: weight,
        }
    }

    #[test]
    fn fewer_than_three_sessions_is_insufficient_data() {
        let sessions = vec![session(1, 100.0), session(8, 102.5)];
        let result = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        assert!(result.insufficient_data);
        assert!(!result.is_plateau);
    }

    #[test]
    fn flat_progression_is_stagnant() {
        let sessions = vec![session(1, 100.0), session(8, 100.0), session(15, 100.0)];
        let result = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        assert!(result.is_plateau);
        assert_eq!(result.kind, Some(PlateauKind::Stagnant));
        assert_eq!(result.weeks_stagnant, Some(3));
        assert_eq!(result.current_max, Some(100.0));
        assert_eq!(result.recommendations.len(), 4);
    }

    #[test]
    fn sharp_drop_is_regression() {
        let sessions = vec![session(1, 100.0), session(8, 95.0), session(15, 88.0)];
        let result = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        assert!(result.is_plateau);
        assert_eq!(result.kind, Some(PlateauKind::Regression));
        assert!((result.weight_loss_pct.expect("regression carries weight_loss_pct") - 12.0).abs() < 1e-9);
    }

    #[test]
    fn regression_wins_tie_break_over_stagnant() {
        // Last three sessions are flat (stagnant) while also down >=10% from
        // the window's first session (regression); regression must win.
        let sessions = vec![session(1, 100.0), session(8, 85.0), session(15, 85.0), session(22, 85.0)];
        let result = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        assert_eq!(result.kind, Some(PlateauKind::Regression));
    }

    #[test]
    fn progressing_lifter_is_not_a_plateau() {
        let sessions = vec![session(1, 100.0), session(8, 105.0), session(15, 110.0)];
        let result = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        assert!(!result.is_plateau);
        assert!(!result.insufficient_data);
        assert_eq!(result.current_max, Some(110.0));
    }

    #[test]
    fn detect_plateau_is_deterministic() {
        let sessions = vec![session(1, 100.0), session(8, 100.0), session(15, 100.0)];
        let a = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        let b = detect_plateau(&sessions, 8, PlateauWindowMode::Sessions);
        assert_eq!(
            serde_json::to_string(&a).expect("serializable"),
            serde_json::to_string(&b).expect("serializable")
        );
    }
}
