// ABOUTME: SyncMetadata persistence — last-attempt tracking per (user, source) and staleness queries
// ABOUTME: Backs the scheduler's alerting pass and the dashboard's sync-health display
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Sync metadata.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{SyncMetadata, SyncOutcome, SyncSource};
use crate::storage::Database;

/// Record the outcome of a sync attempt for `(user_id, source)`, overwriting
/// whatever was there before — this table only ever tracks the most recent
/// attempt per source.
///
/// # Errors
///
/// Returns a database error if the statement fails.
pub async fn record_outcome(
    db: &Database,
    user_id: Uuid,
    source: SyncSource,
    outcome: SyncOutcome,
    records_synced: i64,
    error_message: Option<String>,
) -> AppResult<SyncMetadata> {
    let now = Utc::now();
    sqlx::query(
        r"
        INSERT INTO sync_metadata (user_id, source, last_attempt_at, last_outcome, records_synced, error_message)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, source) DO UPDATE SET
            last_attempt_at = EXCLUDED.last_attempt_at,
            last_outcome = EXCLUDED.last_outcome,
            records_synced = EXCLUDED.records_synced,
            error_message = EXCLUDED.error_message
        ",
    )
    .bind(user_id)
    .bind(source)
    .bind(now)
    .bind(outcome)
    .bind(records_synced)
    .bind(&error_message)
    .execute(db.pool())
    .await?;

    Ok(SyncMetadata {
        user_id,
        source,
        last_attempt_at: now,
        last_outcome: outcome,
        records_synced,
        error_message,
    })
}

/// Fetch the most recent sync metadata row for every source of `user_id`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_for_user(db: &Database, user_id: Uuid) -> AppResult<Vec<SyncMetadata>> {
    let rows = sqlx::query_as::<_, SyncMetadata>(
        r"
        SELECT user_id, source, last_attempt_at, last_outcome, records_synced, error_message
        FROM sync_metadata WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// Fetch every sync metadata row, across all users — the alerting pass
/// runs over the whole table, not one user at a time.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_all(db: &Database) -> AppResult<Vec<SyncMetadata>> {
    let rows = sqlx::query_as::<_, SyncMetadata>(
        "SELECT user_id, source, last_attempt_at, last_outcome, records_synced, error_message FROM sync_metadata",
    )
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// One row of `list_for_user`/`list_all`, judged against a staleness
/// threshold: stale if the last success is older than `threshold` or the
/// last outcome was `failed`.
#[must_use]
pub fn is_stale(row: &SyncMetadata, now: DateTime<Utc>, staleness_hours: i64) -> bool {
    let age = now - row.last_attempt_at;
    row.last_outcome == SyncOutcome::Failed || age > chrono::Duration::hours(staleness_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(outcome: SyncOutcome, hours_ago: i64) -> SyncMetadata {
        SyncMetadata {
            user_id: Uuid::new_v4(),
            source: SyncSource::NutritionScrape,
            last_attempt_at: Utc::now() - chrono::Duration::hours(hours_ago),
            last_outcome: outcome,
            records_synced: 0,
            error_message: None,
        }
    }

    #[test]
    fn failed_outcome_is_always_stale() {
        assert!(is_stale(&row(SyncOutcome::Failed, 0), Utc::now(), 48));
    }

    #[test]
    fn recent_success_is_not_stale() {
        assert!(!is_stale(&row(SyncOutcome::Success, 1), Utc::now(), 48));
    }

    #[test]
    fn old_success_is_stale() {
        assert!(is_stale(&row(SyncOutcome::Success, 49), Utc::now(), 48));
    }
}
