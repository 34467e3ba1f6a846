// ABOUTME: Analysis tools root — plateau detection, cross-domain correlation, holistic snapshot
// ABOUTME: Every function here is pure over shaper output plus constants
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Analysis tools.
//!
//! Three concrete analyses, each a pure function of data the query shapers
//! (`crate::shapers`) already produced, plus the constants in
//! `crate::constants`. None of them touches the database or the LLM
//! directly — determinism (same input, byte-identical output) is the
//! whole point, since the agent treats these as ordinary tool calls and
//! relies on repeatable results across retries.

pub mod correlation;
pub mod plateau;
pub mod snapshot;

pub use correlation::{
    correlation_analysis, CorrelationDay, CorrelationInput, CorrelationOutput, Insight, InsightSeverity, InsightType,
};
pub use plateau::{detect_plateau, PlateauResult, PlateauSession, PlateauWindowMode};
pub use snapshot::{holistic_snapshot, HolisticSnapshot};
