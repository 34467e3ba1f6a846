// ABOUTME: The single normalization boundary between parsers and the upsert service
// ABOUTME: Fixes the "native sentinel leaks into the database layer" bug class
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Normalization.
//!
//! Parsers may hand back `NaN` (from spreadsheet libraries that represent
//! blank cells that way) or non-UTC timestamps. Exactly one place converts
//! those into clean, native types before anything is bound into a `sqlx`
//! statement: this module. Downstream code — the upsert service, the
//! shapers, the analysis tools — assumes clean input and performs no
//! further sentinel handling.

use chrono::{DateTime, Utc};

/// Replace `NaN`/±infinity with `None`; pass finite values through.
#[must_use]
pub fn clean_f64(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Same as [`clean_f64`] but collapses to `0.0` for columns that are
/// `NOT NULL` with a zero default (the scalar nutrition columns).
#[must_use]
pub fn clean_f64_or_zero(value: f64) -> f64 {
    clean_f64(value).unwrap_or(0.0)
}

/// Normalize any timezone-aware timestamp to UTC. By convention, "all
/// timestamp defaults are set by the database clock" — this function is
/// only for timestamps that genuinely come from source data (an export's
/// recorded-at time), never for `created_at`/`updated_at` columns.
#[must_use]
pub fn to_utc<Tz: chrono::TimeZone>(ts: DateTime<Tz>) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

/// A record type that can normalize itself in place before being handed to
/// the upsert service. Implemented by the parser output types in
/// `ingest::parsers`.
pub trait Normalize {
    #[must_use]
    fn normalized(self) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_becomes_none() {
        assert_eq!(clean_f64(f64::NAN), None);
        assert_eq!(clean_f64(f64::INFINITY), None);
        assert_eq!(clean_f64(12.5), Some(12.5));
    }

    #[test]
    fn nan_collapses_to_zero_for_required_columns() {
        assert_eq!(clean_f64_or_zero(f64::NAN), 0.0);
        assert_eq!(clean_f64_or_zero(42.0), 42.0);
    }
}
