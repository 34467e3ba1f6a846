// ABOUTME: User profile CRUD — the minimal surface the profile endpoints need
// ABOUTME: Single-user-per-deployment assumed; the identifier is still carried for schema correctness
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! User accounts.
//!
//! Every other table cascades off `users.id`; this module owns only the
//! row itself. Auth/multi-tenant identity is out of scope so
//! there is no session/credential handling here, just profile CRUD for
//! `GET/POST /user/profile`.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::User;
use crate::storage::Database;

/// Fetch a user by id.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_user(db: &Database, id: Uuid) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, display_name, email, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db.pool())
    .await?;
    Ok(user)
}

/// Create or update a profile. `id` is caller-supplied (opaque) so a
/// client can create its single user up front and refer to it by
/// the same id thereafter.
///
/// # Errors
///
/// Returns a database error if the statement fails (e.g. a duplicate
/// `email`, which carries a `UNIQUE` constraint).
pub async fn upsert_profile(
    db: &Database,
    id: Uuid,
    display_name: Option<&str>,
    email: Option<&str>,
) -> AppResult<User> {
    sqlx::query(
        r"
        INSERT INTO users (id, display_name, email, created_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (id) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            email = EXCLUDED.email
        ",
    )
    .bind(id)
    .bind(display_name)
    .bind(email)
    .execute(db.pool())
    .await?;

    Ok(User {
        id,
        display_name: display_name.map(str::to_owned),
        email: email.map(str::to_owned),
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_caller_supplied_opaque_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(id.get_version_num(), 4);
    }
}
