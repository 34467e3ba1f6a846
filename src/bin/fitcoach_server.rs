// ABOUTME: Server binary — wires configuration, storage, the agent, the scheduler, and HTTP together
// ABOUTME: Production-ready bootstrap, trimmed to this system's single-tenant surface
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

#![forbid(unsafe_code)]

//! Fitness coaching server binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fitcoach_server::agent::{AgentRuntime, AnthropicProvider, ToolRegistry};
use fitcoach_server::config::logging::{self, LogFormat};
use fitcoach_server::config::ServerConfig;
use fitcoach_server::constants::agent_defaults;
use fitcoach_server::http::user_id;
use fitcoach_server::scheduler::{self, ScrapeTarget};
use fitcoach_server::storage::Database;
use fitcoach_server::tracker_client::TrackerClient;
use fitcoach_server::AppState;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fitcoach-server")]
#[command(about = "Personal fitness coaching backend")]
struct Args {
    /// Override the configured `HTTP` port.
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args_or_default();
    let config = setup_configuration(&args)?;
    bootstrap_server(config).await
}

fn parse_args_or_default() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("argument parsing failed: {e}");
            eprintln!("falling back to default configuration");
            Args { http_port: None }
        }
    }
}

fn setup_configuration(args: &Args) -> Result<ServerConfig> {
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    logging::init(config.log_level, LogFormat::from_environment_var())?;
    info!(http_port = config.http_port, "starting fitcoach-server");
    Ok(config)
}

async fn bootstrap_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let db = Database::connect(&config.database).await?;
    info!("database connected and migrations applied");

    let tracker = TrackerClient::new(&config.tracker, Duration::from_secs(config.tool_call_timeout_secs));

    let provider = Arc::new(AnthropicProvider::new(config.llm.api_key.clone(), config.llm.base_url.clone()));
    let tools = Arc::new(ToolRegistry::new());
    let agent = Arc::new(AgentRuntime::new(
        provider,
        tools,
        config.llm.model.clone(),
        agent_defaults::MAX_TOKENS,
        config.chat_history_window,
        Duration::from_secs(config.tool_call_timeout_secs),
    ));

    let target = ScrapeTarget {
        user_id: std::env::var("SCRAPE_TARGET_USER_ID")
            .ok()
            .map_or_else(|| user_id::resolve(None), |raw| user_id::resolve(Some(&raw))),
    };
    let _scheduler = scheduler::start(Arc::clone(&config), db.clone(), tracker.clone(), target).await?;
    info!("scheduler started");

    let state = Arc::new(AppState {
        db,
        tracker,
        agent,
        config: Arc::clone(&config),
    });

    run_server(state, &config).await
}

async fn run_server(state: Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let router = fitcoach_server::http::build_router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    display_available_endpoints(&addr);
    info!(addr, "ready to serve");

    if let Err(e) = axum::serve(listener, router).await {
        error!(error = %e, "server error");
        return Err(e.into());
    }
    Ok(())
}

struct EndpointCategory {
    name: &'static str,
    endpoints: &'static [(&'static str, &'static str, &'static str)],
}

fn display_endpoint_category(category: &EndpointCategory, addr: &str) {
    info!("{}", category.name);
    for (description, method, path) in category.endpoints {
        info!("   {description:28} {method} http://{addr}{path}");
    }
}

fn display_available_endpoints(addr: &str) {
    info!("=== available endpoints ===");
    display_endpoint_category(
        &EndpointCategory {
            name: "Chat:",
            endpoints: &[
                ("Send message:", "POST", "/chat"),
                ("Stream turn:", "POST", "/chat/stream"),
            ],
        },
        addr,
    );
    display_endpoint_category(
        &EndpointCategory {
            name: "Ingestion:",
            endpoints: &[
                ("Upload nutrition export:", "POST", "/nutrition/upload"),
                ("Upload health export:", "POST", "/apple-health/upload"),
                ("Upload health JSON:", "POST", "/upload/apple-health-json"),
            ],
        },
        addr,
    );
    display_endpoint_category(
        &EndpointCategory {
            name: "Dashboard & history:",
            endpoints: &[
                ("Workout history:", "GET", "/workout-history"),
                ("Dashboard stats:", "GET", "/dashboard/stats"),
            ],
        },
        addr,
    );
    display_endpoint_category(
        &EndpointCategory {
            name: "Profile:",
            endpoints: &[
                ("Get profile:", "GET", "/user/profile/:id"),
                ("Save profile:", "POST", "/user/profile"),
            ],
        },
        addr,
    );
    info!("=== end of endpoint list ===");
}
