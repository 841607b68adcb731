//! Database seeders for reference data.
//!
//! Roles, scopes, the route table and the default permission grid are
//! idempotently (re)inserted on every startup so a fresh database is usable
//! without manual setup.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const ROLE_ADMIN: i64 = 1;
pub const ROLE_USER: i64 = 2;
pub const SCOPE_ALL: i64 = 1;
pub const SCOPE_OWNER: i64 = 2;

/// Seed roles, scopes, routes and the default permissions.
pub async fn seed_reference_data(pool: &SqlitePool) -> Result<()> {
    info!("Seeding reference data...");

    let now = Utc::now();

    let roles: Vec<(i64, &str, &str)> = vec![
        (ROLE_ADMIN, "admin", "Full access to every record"),
        (ROLE_USER, "user", "Access to records the user created"),
    ];
    for (role_id, name, description) in roles {
        sqlx::query(
            "INSERT OR IGNORE INTO roles (role_id, name, description, active, created_by, created_at)
             VALUES (?, ?, ?, 1, 0, ?)",
        )
        .bind(role_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .execute(pool)
        .await?;
    }

    let scopes: Vec<(i64, &str, &str)> = vec![
        (SCOPE_ALL, "all", "All records"),
        (SCOPE_OWNER, "owner", "Records created by the requesting user"),
    ];
    for (scope_id, name, description) in scopes {
        sqlx::query(
            "INSERT OR IGNORE INTO scopes (scope_id, name, description, active, created_by, created_at)
             VALUES (?, ?, ?, 1, 0, ?)",
        )
        .bind(scope_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .execute(pool)
        .await?;
    }

    let routes: Vec<(i64, &str, &str)> = vec![
        (1, "/bookings", "Booking operations"),
        (2, "/rooms", "Room operations"),
        (3, "/users", "User operations"),
    ];
    for (route_id, url, description) in &routes {
        sqlx::query(
            "INSERT OR IGNORE INTO routes (route_id, url, description, active, created_by, created_at)
             VALUES (?, ?, ?, 1, 0, ?)",
        )
        .bind(route_id)
        .bind(url)
        .bind(description)
        .bind(now)
        .execute(pool)
        .await?;
    }

    // Admin: `all` scope everywhere. User: owner-only on bookings and users,
    // `all` on rooms (anyone may look rooms up to book them).
    let permissions: Vec<(i64, i64, i64)> = vec![
        (ROLE_ADMIN, 1, SCOPE_ALL),
        (ROLE_ADMIN, 2, SCOPE_ALL),
        (ROLE_ADMIN, 3, SCOPE_ALL),
        (ROLE_USER, 1, SCOPE_OWNER),
        (ROLE_USER, 2, SCOPE_ALL),
        (ROLE_USER, 3, SCOPE_OWNER),
    ];
    for (role_id, route_id, scope_id) in permissions {
        sqlx::query(
            "INSERT OR IGNORE INTO permissions (role_id, route_id, scope_id, active, created_at)
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(role_id)
        .bind(route_id)
        .bind(scope_id)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Create the initial admin user if no user with that username exists.
/// `password_hash` is computed by the auth service from the configured
/// credentials; an empty username skips seeding entirely.
pub async fn ensure_admin_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<()> {
    if username.is_empty() || password_hash.is_empty() {
        warn!("No admin credentials configured, skipping admin user seeding");
        return Ok(());
    }

    let existing: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO users (name, email, telephone, role_id, username, password_hash, active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind("Administrator")
    .bind("admin@localhost")
    .bind("")
    .bind(ROLE_ADMIN)
    .bind(username)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    info!(username, "Created admin user");
    Ok(())
}
