// ABOUTME: System-wide constants and environment-variable-driven defaults
// ABOUTME: Mirrors the "constants module" convention used throughout this codebase
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Application constants and environment-based configuration defaults.

use std::env;

/// `HTTP` status codes used by `ErrorCode::http_status`.
pub mod http_status {
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const UNPROCESSABLE_ENTITY: u16 = 422;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const BAD_GATEWAY: u16 = 502;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    pub const GATEWAY_TIMEOUT: u16 = 504;
}

/// Environment-variable-backed defaults. Each getter reads its own variable
/// and falls back to a literal default rather than failing boot — only the
/// variables listed in `config::environment` are hard requirements.
pub mod env_config {
    use super::env;

    #[must_use]
    pub fn http_port() -> u16 {
        env::var("HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080)
    }

    #[must_use]
    pub fn log_level() -> String {
        env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())
    }

    /// Maximum number of most-recent chat messages loaded into the agent's
    /// context window per turn.
    #[must_use]
    pub fn chat_history_window() -> usize {
        env::var("CHAT_HISTORY_WINDOW")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(40)
    }

    /// Per-tool execution deadline, seconds.
    #[must_use]
    pub fn tool_call_timeout_secs() -> u64 {
        env::var("TOOL_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20)
    }

    /// SyncMetadata alert staleness threshold, hours. The source material left
    /// the 24h/48h conflict open; this fixes the default at 48h.
    #[must_use]
    pub fn sync_staleness_hours() -> i64 {
        env::var("SYNC_STALENESS_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(48)
    }

    /// Browser-automation wall-clock budget for the nutrition scrape job, seconds.
    #[must_use]
    pub fn scrape_job_timeout_secs() -> u64 {
        env::var("SCRAPE_JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(180)
    }

    /// Number of trailing days requested from the nutrition provider export.
    #[must_use]
    pub fn scrape_lookback_days() -> i64 {
        env::var("SCRAPE_LOOKBACK_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7)
    }

    /// Row ceiling per upsert statement.
    #[must_use]
    pub fn upsert_batch_size() -> usize {
        env::var("UPSERT_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500)
    }

    /// Horizon after which raw health-metric rows become eligible for
    /// hypertable compression.
    #[must_use]
    pub fn health_raw_compress_after_days() -> i64 {
        env::var("HEALTH_RAW_COMPRESS_AFTER_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30)
    }
}

/// Plateau-detection constants.
pub mod plateau {
    /// Default lookback window, in sessions.
    pub const DEFAULT_LOOKBACK_SESSIONS: usize = 8;
    /// Minimum sessions required before a verdict can be rendered.
    pub const MIN_SESSIONS: usize = 3;
    /// Sessions considered for the "stagnant" (min-of-last-N) rule.
    pub const STAGNANT_TAIL: usize = 3;
    /// Regression threshold: last session <= 0.9 * first session in window.
    pub const REGRESSION_RATIO: f64 = 0.9;
}

/// Correlation-analysis thresholds. Configurable in principle;
/// fixed here as the documented defaults.
pub mod correlation_thresholds {
    pub const MIN_PROTEIN_PER_KG: f64 = 1.6;
    pub const TARGET_PROTEIN_PER_KG: f64 = 1.8;
    pub const MIN_WORKOUTS_PER_WEEK: f64 = 3.0;
}

/// Agent-loop defaults not worth a dedicated environment variable.
pub mod agent_defaults {
    /// Upper bound on tokens generated per model call.
    pub const MAX_TOKENS: u32 = 4096;
}
