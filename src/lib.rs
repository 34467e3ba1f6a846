// ABOUTME: Crate root — module tree and the shared application state handed to every route
// ABOUTME: Thin composition layer; the real behavior lives in each module
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

#![forbid(unsafe_code)]

//! Personal fitness-coaching backend.
//!
//! Ties together chat persistence, an LLM-driven tool-calling agent, a
//! set of ingestion parsers and upserts for nutrition/health/workout
//! data, a cron-driven nutrition scraper, and a thin `HTTP` façade.
//! See each submodule's docs for its own contract.

pub mod agent;
pub mod analysis;
pub mod chat;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod errors;
pub mod http;
pub mod ingest;
pub mod models;
pub mod scheduler;
pub mod shapers;
pub mod storage;
pub mod tracker_client;

use std::sync::Arc;

use crate::agent::AgentRuntime;
use crate::config::ServerConfig;
use crate::storage::Database;
use crate::tracker_client::TrackerClient;

/// Shared state handed to every `axum` route via `.with_state()`.
///
/// Cloning is cheap: `Database` and `TrackerClient` wrap a pool handle
/// and plain config respectively, and `AgentRuntime`/`ServerConfig` are
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tracker: TrackerClient,
    pub agent: Arc<AgentRuntime>,
    pub config: Arc<ServerConfig>,
}
