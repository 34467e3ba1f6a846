// ABOUTME: Caller-supplied user identifier resolution shared by every HTTP handler
// ABOUTME: Single-user-per-deployment assumed, so a missing id resolves to one fixed default
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Every external request carries an optional, caller-chosen `user_id`
//! string rather than an authenticated identity — authentication is out
//! of scope. A value that parses as a `UUID` is used as-is; anything
//! else (an opaque client-side id such as `"u1"`) is folded
//! deterministically onto a `UUID` via `UUIDv5`, so the same string
//! always resolves to the same row. Omitting it entirely resolves to one
//! fixed default user, which is the common case for a single-user
//! deployment.

use uuid::Uuid;

/// Namespace `UUID` this deployment derives caller-supplied ids under.
/// Arbitrary but fixed, so derivation is stable across restarts.
const USER_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x9c, 0x1d, 0x9b, 0x9a, 0x9a, 0x0b, 0x4a, 0x1e, 0xb1, 0x8c, 0x6a, 0x1b, 0x3c, 0x2d, 0x4e, 0x5f,
]);

/// Fixed id used when the caller supplies none at all.
const DEFAULT_USER_ID: Uuid = Uuid::from_bytes([0u8; 16]);

/// Resolve a caller-supplied identifier into the stable `UUID` that
/// owns its rows.
#[must_use]
pub fn resolve(raw: Option<&str>) -> Uuid {
    match raw {
        None | Some("") => DEFAULT_USER_ID,
        Some(s) => Uuid::parse_str(s).unwrap_or_else(|_| Uuid::new_v5(&USER_ID_NAMESPACE, s.as_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_opaque_id_resolves_to_same_uuid() {
        assert_eq!(resolve(Some("u1")), resolve(Some("u1")));
    }

    #[test]
    fn distinct_opaque_ids_resolve_differently() {
        assert_ne!(resolve(Some("u1")), resolve(Some("u2")));
    }

    #[test]
    fn a_real_uuid_round_trips_unchanged() {
        let id = Uuid::new_v4();
        assert_eq!(resolve(Some(&id.to_string())), id);
    }

    #[test]
    fn missing_id_resolves_to_the_fixed_default() {
        assert_eq!(resolve(None), DEFAULT_USER_ID);
        assert_eq!(resolve(Some("")), DEFAULT_USER_ID);
    }
}
