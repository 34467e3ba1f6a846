// ABOUTME: Environment-variable-driven configuration, parsed and validated once at boot
// ABOUTME: A ServerConfig::from_env pattern, validated once at boot
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Boot-time configuration.
//!
//! Credentials are consumed from the environment at process
//! start only — rotation requires a restart. A missing required
//! variable is fatal at boot (`ConfigError`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use crate::constants::env_config;

/// Strongly typed log level, mirrors `tracing::Level`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres (with the `TimescaleDB` extension) connection string.
    pub url: String,
    /// Apply pending `sqlx` migrations on startup.
    pub auto_migrate: bool,
    pub max_connections: u32,
}

/// Credentials and endpoints for the external tracker MCP tool server.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Executable to spawn for each ephemeral MCP session.
    pub command: String,
    /// Arguments passed to the spawned process.
    pub args: Vec<String>,
    /// API key injected into the spawned process's environment, never into
    /// tool arguments.
    pub api_key: String,
}

/// Nutrition-site scraper credentials.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub username: String,
    pub password: String,
    /// `WebDriver` endpoint the headless browser session connects to.
    pub webdriver_url: String,
    pub cron_expression: String,
    pub lookback_days: i64,
    pub job_timeout_secs: u64,
}

/// LLM backend selection and credentials.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    pub token: Option<String>,
    pub debug: bool,
}

/// Top-level, validated server configuration. Analogous to a typical
/// `ServerConfig`, trimmed to this system's single-tenant surface.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub log_level: LogLevel,
    pub database: DatabaseConfig,
    pub tracker: TrackerConfig,
    pub scraper: ScraperConfig,
    pub llm: LlmConfig,
    pub observability: ObservabilityConfig,
    pub chat_history_window: usize,
    pub tool_call_timeout_secs: u64,
    pub sync_staleness_hours: i64,
    pub upsert_batch_size: usize,
    pub health_raw_compress_after_days: i64,
}

fn require_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("required environment variable {name} is not set"))
}

impl ServerConfig {
    /// Load and validate configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse; callers should treat this as fatal and exit non-zero.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            http_port: env_config::http_port(),
            log_level: LogLevel::from_str_or_default(&env_config::log_level()),
            database: DatabaseConfig {
                url: require_var("DATABASE_URL")?,
                auto_migrate: env::var("AUTO_MIGRATE")
                    .map(|v| v != "false" && v != "0")
                    .unwrap_or(true),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            },
            tracker: TrackerConfig {
                command: require_var("TRACKER_MCP_COMMAND")?,
                args: env::var("TRACKER_MCP_ARGS")
                    .map(|v| v.split_whitespace().map(str::to_owned).collect())
                    .unwrap_or_default(),
                api_key: require_var("TRACKER_API_KEY")?,
            },
            scraper: ScraperConfig {
                username: require_var("NUTRITION_SCRAPER_USERNAME")?,
                password: require_var("NUTRITION_SCRAPER_PASSWORD")?,
                webdriver_url: env::var("WEBDRIVER_URL")
                    .unwrap_or_else(|_| "http://localhost:9515".into()),
                cron_expression: env::var("NUTRITION_SYNC_CRON")
                    .unwrap_or_else(|_| "0 0 2 * * *".into()),
                lookback_days: env_config::scrape_lookback_days(),
                job_timeout_secs: env_config::scrape_job_timeout_secs(),
            },
            llm: LlmConfig {
                api_key: require_var("LLM_API_KEY")?,
                base_url: env::var("LLM_BASE_URL")
                    .unwrap_or_else(|_| "https://api.anthropic.com".into()),
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "claude-sonnet-4-5".into()),
            },
            observability: ObservabilityConfig {
                token: env::var("OBSERVABILITY_TOKEN").ok(),
                debug: env::var("DEBUG").map(|v| v == "true" || v == "1").unwrap_or(false),
            },
            chat_history_window: env_config::chat_history_window(),
            tool_call_timeout_secs: env_config::tool_call_timeout_secs(),
            sync_staleness_hours: env_config::sync_staleness_hours(),
            upsert_batch_size: env_config::upsert_batch_size(),
            health_raw_compress_after_days: env_config::health_raw_compress_after_days(),
        };

        config.validate()?;
        info!(http_port = config.http_port, log_level = config.log_level.as_str(), "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.http_port > 0, "HTTP_PORT must be nonzero");
        anyhow::ensure!(
            self.chat_history_window > 0,
            "CHAT_HISTORY_WINDOW must be positive"
        );
        anyhow::ensure!(
            self.scraper.lookback_days > 0,
            "SCRAPE_LOOKBACK_DAYS must be positive"
        );
        Ok(())
    }
}
