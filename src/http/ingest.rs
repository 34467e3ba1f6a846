// ABOUTME: Upload routes — nutrition spreadsheet and apple-health payloads
// ABOUTME: The apple-health route content-sniffs its body to pick a parser
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Ingestion upload routes.
//!
//! The nutrition route always takes a spreadsheet via multipart. The
//! health route accepts three distinct body shapes at the same path and
//! picks among them by sniffing the JSON for a `metrics` key (the
//! compact daily envelope), a `readings` key or bare array (the raw
//! time-series envelope), falling back to Apple's XML export otherwise.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::ingest::{parse_apple_health_xml, parse_health_daily_envelope, parse_health_json_envelope, parse_nutrition_spreadsheet};
use crate::storage::upsert::{upsert_health_metric_daily, upsert_health_metric_raw, upsert_nutrition_days, UpsertOutcome};
use crate::AppState;

use super::user_id::resolve as resolve_user_id;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub new_records: usize,
    pub updated_records: usize,
    pub skipped_duplicates: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl UploadResponse {
    fn from_outcome(outcome: UpsertOutcome, date_range: Option<(NaiveDate, NaiveDate)>) -> Self {
        Self {
            new_records: outcome.new_records,
            updated_records: outcome.updated_records,
            skipped_duplicates: outcome.skipped_duplicates,
            date_range,
        }
    }
}

#[must_use]
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/nutrition/upload", post(upload_nutrition))
        .route("/apple-health/upload", post(upload_health))
        .route("/upload/apple-health-json", post(upload_health))
        .with_state(state)
}

async fn read_multipart_file(mut multipart: Multipart, field_name: &str) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(crate::errors::ErrorCode::InvalidInput, format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some(field_name) {
            return field
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| AppError::new(crate::errors::ErrorCode::InvalidInput, format!("failed to read upload: {e}")));
        }
    }
    Err(AppError::new(
        crate::errors::ErrorCode::InvalidInput,
        format!("multipart body missing a '{field_name}' field"),
    ))
}

async fn upload_nutrition(State(state): State<Arc<AppState>>, multipart: Multipart) -> AppResult<Json<UploadResponse>> {
    let bytes = read_multipart_file(multipart, "file").await?;
    // Single-user deployment: the user owning an upload is not carried
    // in the multipart body, so it resolves to the fixed default.
    let user_id = resolve_user_id(None);

    let rows: Vec<crate::models::NutritionDay> = parse_nutrition_spreadsheet(user_id, &bytes)?.collect::<AppResult<_>>()?;
    let date_range = date_range(rows.iter().map(|r| r.date));
    let outcome = upsert_nutrition_days(&state.db, rows, state.config.upsert_batch_size).await?;

    Ok(Json(UploadResponse::from_outcome(outcome, date_range)))
}

async fn upload_health(State(state): State<Arc<AppState>>, body: axum::body::Bytes) -> AppResult<Json<UploadResponse>> {
    let user_id = resolve_user_id(None);

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&body) {
        if value.get("metrics").is_some() {
            let rows = parse_health_daily_envelope(user_id, &body)?;
            let date_range = date_range(rows.iter().map(|r| r.date));
            let outcome = upsert_health_metric_daily(&state.db, rows, state.config.upsert_batch_size).await?;
            return Ok(Json(UploadResponse::from_outcome(outcome, date_range)));
        }
        if value.get("readings").is_some() || value.is_array() {
            let rows = parse_health_json_envelope(user_id, &body)?;
            let date_range = date_range(rows.iter().map(|r| r.recorded_at.date_naive()));
            let outcome = upsert_health_metric_raw(&state.db, rows, state.config.upsert_batch_size).await?;
            return Ok(Json(UploadResponse::from_outcome(outcome, date_range)));
        }
    }

    let rows: Vec<crate::models::HealthMetricRaw> = parse_apple_health_xml(user_id, &body).collect::<AppResult<_>>()?;
    let date_range = date_range(rows.iter().map(|r| r.recorded_at.date_naive()));
    let outcome = upsert_health_metric_raw(&state.db, rows, state.config.upsert_batch_size).await?;
    Ok(Json(UploadResponse::from_outcome(outcome, date_range)))
}

fn date_range(dates: impl Iterator<Item = NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    dates.fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((min, max)) => Some((min.min(d), max.max(d))),
    })
}
