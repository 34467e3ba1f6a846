// ABOUTME: Storage layer root — connection pool, migrations, and per-entity accessors
// ABOUTME: A single-backend storage module
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Storage.
//!
//! Unlike a design that abstracts over `SQLite`/`PostgreSQL` behind a
//! `DatabaseProvider` trait (it supports both for different deployment
//! sizes), this system targets a single backend — "one relational database
//! (`PostgreSQL` with a time-series extension)". The `Database` struct
//! below is the sole implementation; it is still constructed behind an
//! `Arc` and passed around as a handle so call sites read the same way a
//! trait object would, and so tests can swap in a pool pointed at a
//! disposable database.

pub mod derive;
pub mod goals;
pub mod normalize;
pub mod sync;
pub mod upsert;
pub mod users;
pub mod workouts;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

use crate::config::environment::DatabaseConfig;
use crate::errors::AppResult;

/// Embedded migration set.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Thin wrapper around the `sqlx` connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: Pool<Postgres>,
}

impl Database {
    /// Connect and optionally apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established or migrations fail.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await?;

        if config.auto_migrate {
            MIGRATOR.run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Construct directly from an existing pool (used by tests against a
    /// `testcontainers`-managed Postgres instance).
    #[must_use]
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
