// ABOUTME: Headless-browser nutrition scrape — logs in, requests an export, parses, upserts
// ABOUTME: One scrape attempt is one outcome row in sync_metadata, success or failure
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Nutrition scraper.
//!
//! Drives a headless browser against the nutrition provider's web UI: log
//! in with stored credentials, request an export covering the trailing
//! `lookback_days`, download the bytes, and hand them to the spreadsheet
//! parser and the upsert service. The outcome (success, partial, or
//! failed, with a record count or error message) is always recorded in
//! `sync_metadata`, even when the scrape itself throws before a single
//! row is parsed.

use chrono::Utc;
use thirtyfour::prelude::*;
use uuid::Uuid;

use crate::config::environment::ScraperConfig;
use crate::errors::{AppError, AppResult};
use crate::ingest::nutrition_parser::parse_nutrition_spreadsheet;
use crate::models::SyncSource;
use crate::storage::sync::record_outcome;
use crate::storage::upsert::upsert_nutrition_days;
use crate::storage::Database;

const LOGIN_URL: &str = "https://www.cronometer.com/login/";
const EXPORT_URL: &str = "https://www.cronometer.com/export/";

/// Run one scrape attempt end to end and record its outcome in
/// `sync_metadata` regardless of success or failure.
///
/// # Errors
///
/// Returns the same error it records in `sync_metadata`, so a caller that
/// wants to `?`-propagate still sees the failure; [`super::start`]'s
/// scheduled job only logs it.
pub async fn run_nutrition_scrape(config: &ScraperConfig, db: &Database, user_id: Uuid) -> AppResult<usize> {
    match scrape_and_ingest(config, db, user_id).await {
        Ok(count) => {
            record_outcome(db, user_id, SyncSource::NutritionScrape, crate::models::SyncOutcome::Success, count as i64, None)
                .await?;
            Ok(count)
        }
        Err(err) => {
            let outcome = if matches!(err.code, crate::errors::ErrorCode::TimeoutError) {
                "timeout"
            } else {
                "failed"
            };
            let _ = record_outcome(
                db,
                user_id,
                SyncSource::NutritionScrape,
                crate::models::SyncOutcome::Failed,
                0,
                Some(format!("{outcome}: {}", err.message)),
            )
            .await;
            Err(err)
        }
    }
}

async fn scrape_and_ingest(config: &ScraperConfig, db: &Database, user_id: Uuid) -> AppResult<usize> {
    let bytes = download_export(config).await?;

    let rows: Vec<crate::models::NutritionDay> = parse_nutrition_spreadsheet(user_id, &bytes)?.collect::<AppResult<_>>()?;
    let outcome = upsert_nutrition_days(db, rows, 500).await?;
    Ok(outcome.new_records + outcome.updated_records)
}

async fn download_export(config: &ScraperConfig) -> AppResult<Vec<u8>> {
    let caps = DesiredCapabilities::chrome();
    let driver = WebDriver::new(&config.webdriver_url, caps)
        .await
        .map_err(|e| AppError::new(crate::errors::ErrorCode::ScrapeError, format!("failed to start browser session: {e}")))?;

    let result = run_export_flow(&driver, config).await;

    // Always tear the session down, even if the flow above failed partway.
    let _ = driver.quit().await;
    result
}

async fn run_export_flow(driver: &WebDriver, config: &ScraperConfig) -> AppResult<Vec<u8>> {
    driver
        .goto(LOGIN_URL)
        .await
        .map_err(|e| scrape_error("failed to load login page", &e))?;

    driver
        .find(By::Id("username"))
        .await
        .map_err(|e| scrape_error("login form not found", &e))?
        .send_keys(&config.username)
        .await
        .map_err(|e| scrape_error("failed to enter username", &e))?;

    driver
        .find(By::Id("password"))
        .await
        .map_err(|e| scrape_error("login form not found", &e))?
        .send_keys(&config.password)
        .await
        .map_err(|e| scrape_error("failed to enter password", &e))?;

    driver
        .find(By::Css("button[type='submit']"))
        .await
        .map_err(|e| scrape_error("login submit button not found", &e))?
        .click()
        .await
        .map_err(|e| scrape_error("failed to submit login form", &e))?;

    let end = Utc::now().date_naive();
    let start = end - chrono::Duration::days(config.lookback_days);
    let export_url = format!("{EXPORT_URL}?start={start}&end={end}&format=csv");

    driver
        .goto(&export_url)
        .await
        .map_err(|e| scrape_error("failed to load export page", &e))?;

    let body = driver
        .source()
        .await
        .map_err(|e| scrape_error("failed to read export response", &e))?;

    Ok(body.into_bytes())
}

fn scrape_error(context: &str, err: &WebDriverError) -> AppError {
    AppError::new(crate::errors::ErrorCode::ScrapeError, format!("{context}: {err}"))
}
