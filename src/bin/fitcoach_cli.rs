// ABOUTME: Administrative CLI — one-off operational tasks the HTTP surface doesn't expose
// ABOUTME: Connects directly to storage/scheduler internals; no agent, no long-lived process
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

#![forbid(unsafe_code)]

//! Operator CLI for `fitcoach-server`.
//!
//! Companion to the `fitcoach-server` binary: the server handles live
//! traffic, this handles the tasks an operator runs by hand — checking
//! sync health, forcing a derived-aggregate rebuild, kicking off a
//! nutrition scrape out of band, or fixing up a user's profile — without
//! going through the HTTP façade or standing up the agent runtime.
//!
//! ```bash
//! fitcoach-cli sync-status
//! fitcoach-cli derive-health --user <uuid> --from 2026-01-01 --to 2026-01-31
//! fitcoach-cli run-scrape --user <uuid>
//! fitcoach-cli profile-set --id <uuid> --display-name "Jordan" --email jordan@example.com
//! ```

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fitcoach_server::config::logging::{self, LogFormat};
use fitcoach_server::config::ServerConfig;
use fitcoach_server::models::SyncOutcome;
use fitcoach_server::scheduler::run_nutrition_scrape;
use fitcoach_server::storage::derive::{derive_daily_from_raw, regenerate_weekly_summary};
use fitcoach_server::storage::sync::{is_stale, list_all, list_for_user};
use fitcoach_server::storage::users::{get_user, upsert_profile};
use fitcoach_server::storage::Database;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "fitcoach-cli")]
#[command(about = "Operator commands for the fitness-coaching backend")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply any pending schema migrations and exit.
    Migrate,
    /// Print the most recent sync outcome for every (user, source), or
    /// just one user if `--user` is given, flagging stale rows.
    SyncStatus {
        #[arg(long)]
        user: Option<Uuid>,
    },
    /// Recompute `health_metric_daily` and `health_weekly_summary` for a
    /// user over an explicit date range, bypassing the upload path.
    DeriveHealth {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value_t = 12)]
        weeks: i64,
    },
    /// Trigger one nutrition-scrape attempt immediately, outside the cron
    /// schedule, recording its outcome in `sync_metadata` as usual.
    RunScrape {
        #[arg(long)]
        user: Uuid,
    },
    /// Fetch a user's profile by id.
    ProfileGet {
        #[arg(long)]
        id: Uuid,
    },
    /// Create or update a user's profile.
    ProfileSet {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServerConfig::from_env()?;
    logging::init(config.log_level, LogFormat::from_environment_var())?;

    let db = Database::connect(&config.database).await?;

    match args.command {
        Command::Migrate => {
            info!("migrations applied at connect time");
        }
        Command::SyncStatus { user } => sync_status(&db, user, config.sync_staleness_hours).await?,
        Command::DeriveHealth { user, from, to, weeks } => derive_health(&db, user, from, to, weeks).await?,
        Command::RunScrape { user } => {
            let count = run_nutrition_scrape(&config.scraper, &db, user).await?;
            println!("scrape complete: {count} nutrition days ingested");
        }
        Command::ProfileGet { id } => profile_get(&db, id).await?,
        Command::ProfileSet { id, display_name, email } => {
            let user = upsert_profile(&db, id, display_name.as_deref(), email.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
    }

    db.close().await;
    Ok(())
}

async fn sync_status(db: &Database, user: Option<Uuid>, staleness_hours: i64) -> Result<()> {
    let rows = match user {
        Some(id) => list_for_user(db, id).await?,
        None => list_all(db).await?,
    };

    if rows.is_empty() {
        println!("no sync_metadata rows found");
        return Ok(());
    }

    let now = chrono::Utc::now();
    for row in &rows {
        let stale = is_stale(row, now, staleness_hours);
        let flag = if stale { "STALE" } else { "ok" };
        let outcome = match row.last_outcome {
            SyncOutcome::Success => "success",
            SyncOutcome::Partial => "partial",
            SyncOutcome::Failed => "failed",
        };
        println!(
            "{:<36} {:<16?} {:<8} {:>8} records  last_attempt={}  [{flag}]",
            row.user_id, row.source, outcome, row.records_synced, row.last_attempt_at
        );
        if let Some(err) = &row.error_message {
            println!("    error: {err}");
        }
    }
    Ok(())
}

async fn derive_health(db: &Database, user: Uuid, from: NaiveDate, to: NaiveDate, weeks: i64) -> Result<()> {
    let daily_rows = derive_daily_from_raw(db, user, from, to).await?;
    let weekly_rows = regenerate_weekly_summary(db, user, weeks).await?;
    println!("derived {daily_rows} daily rows and {weekly_rows} weekly summary rows for {user}");
    Ok(())
}

async fn profile_get(db: &Database, id: Uuid) -> Result<()> {
    match get_user(db, id).await? {
        Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
        None => println!("no user with id {id}"),
    }
    Ok(())
}
