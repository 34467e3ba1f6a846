// ABOUTME: Structured logging setup built on tracing-subscriber
// ABOUTME: Log format selection, trimmed to one sink
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Production-ready logging configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::environment::LogLevel;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Newline-delimited `JSON`, for production / log aggregators.
    Json,
    /// Human-readable, for local development.
    Pretty,
}

impl LogFormat {
    /// Pick a format from the `ENVIRONMENT` variable: anything other than
    /// `development`/`test` gets `JSON`.
    #[must_use]
    pub fn from_environment_var() -> Self {
        match std::env::var("ENVIRONMENT").as_deref() {
            Ok("development" | "test") => Self::Pretty,
            _ => Self::Json,
        }
    }
}

/// Initialize the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init(level: LogLevel, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_target(true).with_current_span(true))
                .try_init()?;
        }
        LogFormat::Pretty => {
            registry
                .with(fmt::layer().pretty().with_target(false))
                .try_init()?;
        }
    }

    Ok(())
}
