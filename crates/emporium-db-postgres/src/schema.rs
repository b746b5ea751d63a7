//! Idempotent schema bootstrap.
//!
//! Uniqueness that the services rely on lives here: user email and
//! username, instrument name, and one cart per user.

use sqlx_core::query::query;
use sqlx_postgres::PgPool;
use tracing::info;

use crate::error::{PostgresError, Result};

pub(crate) const USERS_EMAIL_KEY: &str = "users_email_key";
pub(crate) const USERS_USERNAME_KEY: &str = "users_username_key";
pub(crate) const INSTRUMENTS_NAME_KEY: &str = "instruments_name_key";

const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        confirmed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email)",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (username)",
    r#"CREATE TABLE IF NOT EXISTS instruments (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price DOUBLE PRECISION NOT NULL
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS instruments_name_key ON instruments (name)",
    r#"CREATE TABLE IF NOT EXISTS carts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        items JSONB NOT NULL DEFAULT '[]'::jsonb
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS carts_user_id_key ON carts (user_id)",
    r#"CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        items JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS orders_user_id_idx ON orders (user_id)",
];

/// Creates all tables and indexes if they do not exist yet.
pub async fn bootstrap(pool: &PgPool) -> Result<()> {
    for statement in STATEMENTS {
        query(statement)
            .execute(pool)
            .await
            .map_err(|e| PostgresError::Schema(e.to_string()))?;
    }
    info!(statements = STATEMENTS.len(), "Database schema ready");
    Ok(())
}
