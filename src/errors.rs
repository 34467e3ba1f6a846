// ABOUTME: Centralized error taxonomy and AppError type shared across the crate
// ABOUTME: An ErrorCode/AppError split rendering a stable JSON body via axum
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Unified error handling.
//!
//! `ErrorCode` enumerates the taxonomy (`ConfigError`,
//! `ParseError`, `IngestConflict`, `ToolError`, `ModelError`,
//! `ScrapeError`, `TimeoutError`, plus generic request/storage errors).
//! `AppError` pairs a code with a message and renders as a stable,
//! client-safe JSON body via `axum::response::IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::http_status;

/// Standard error codes, one per taxonomy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing/invalid environment; fatal at boot.
    ConfigError,
    /// Malformed input file; nothing persisted.
    ParseError,
    /// CHECK constraint violation during upsert; batch aborted.
    IngestConflict,
    /// MCP tool-server failure.
    ToolError,
    /// Transport or protocol failure talking to the LLM.
    ModelError,
    /// Scheduled ingestion job failure.
    ScrapeError,
    /// Any deadline exceeded.
    TimeoutError,
    /// Input failed request-level validation.
    InvalidInput,
    /// Requested resource was not found.
    ResourceNotFound,
    /// Resource already exists / conflicting state.
    Conflict,
    /// Database operation failed for a reason not covered above.
    DatabaseError,
    /// Unclassified internal error.
    InternalError,
}

impl ErrorCode {
    /// `HTTP` status code for this error.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::ParseError => http_status::BAD_REQUEST,
            Self::ResourceNotFound => http_status::NOT_FOUND,
            Self::Conflict | Self::IngestConflict => http_status::CONFLICT,
            Self::TimeoutError => http_status::GATEWAY_TIMEOUT,
            Self::ToolError | Self::ScrapeError => http_status::BAD_GATEWAY,
            Self::ModelError => http_status::SERVICE_UNAVAILABLE,
            Self::ConfigError
            | Self::DatabaseError
            | Self::InternalError => http_status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable code string surfaced to clients alongside the message.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "config_error",
            Self::ParseError => "parse_error",
            Self::IngestConflict => "ingest_conflict",
            Self::ToolError => "tool_error",
            Self::ModelError => "model_error",
            Self::ScrapeError => "scrape_error",
            Self::TimeoutError => "timeout_error",
            Self::InvalidInput => "invalid_input",
            Self::ResourceNotFound => "resource_not_found",
            Self::Conflict => "conflict",
            Self::DatabaseError => "database_error",
            Self::InternalError => "internal_error",
        }
    }
}

/// The crate-wide error type. Carries a stable code, a human sentence, and
/// (for `IngestConflict`) the offending records, per the propagation
/// policy: "user-visible failures always carry a stable, short code plus a
/// human sentence."
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code_str}: {message}", code_str = code.as_str())]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    /// Up to N violating records for `IngestConflict`.
    pub offenders: Vec<serde_json::Value>,
}

impl AppError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            offenders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_offenders(mut self, offenders: Vec<serde_json::Value>) -> Self {
        self.offenders = offenders;
        self
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    #[must_use]
    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ToolError, message)
    }

    #[must_use]
    pub fn model(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelError, message)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TimeoutError, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database operation failed");
        Self::new(ErrorCode::DatabaseError, "database operation failed")
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        tracing::error!(error = %err, "migration failed");
        Self::new(ErrorCode::ConfigError, format!("migration failed: {err}"))
    }
}

/// `HTTP` error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub offenders: Vec<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(code = self.code.as_str(), message = %self.message, "request error");
        let status =
            StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            code: self.code.as_str(),
            message: self.message,
            offenders: self.offenders,
        };
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;
