//! Identity store and registration transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emporium_core::Identity;
use emporium_storage::{IdentityStore, IdentityTransaction, StorageError};
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgTransaction};

use crate::convert::{chrono_to_time, time_to_chrono};
use crate::error::{query_error, unique_violation};
use crate::schema::{USERS_EMAIL_KEY, USERS_USERNAME_KEY};

const KIND: &str = "user";

const SELECT_COLUMNS: &str =
    "SELECT id, username, email, password_hash, confirmed, created_at, updated_at FROM users";

type IdentityRow = (
    String,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn from_row(row: IdentityRow) -> Identity {
    Identity {
        id: row.0,
        username: row.1,
        email: row.2,
        password_hash: row.3,
        confirmed: row.4,
        created_at: chrono_to_time(row.5),
        updated_at: row.6.map(chrono_to_time),
    }
}

/// Maps a write error, turning unique violations into `AlreadyExists`.
fn write_error(err: SqlxError, identity: &Identity) -> StorageError {
    match unique_violation(&err).as_deref() {
        Some(USERS_EMAIL_KEY) => StorageError::already_exists(KIND, "email", &identity.email),
        Some(USERS_USERNAME_KEY) => {
            StorageError::already_exists(KIND, "username", &identity.username)
        }
        Some(_) => StorageError::already_exists(KIND, "id", &identity.id),
        None => query_error("Failed to write user", err),
    }
}

#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn begin(&self) -> Result<Box<dyn IdentityTransaction>, StorageError> {
        let tx = self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })?;
        Ok(Box::new(PostgresIdentityTransaction { tx }))
    }

    async fn get(&self, id: &str) -> Result<Option<Identity>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        let row: Option<IdentityRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to read user", e))?;
        Ok(row.map(from_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE email = $1");
        let row: Option<IdentityRow> = query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to read user", e))?;
        Ok(row.map(from_row))
    }

    async fn list(&self) -> Result<Vec<Identity>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at, id");
        let rows: Vec<IdentityRow> = query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("Failed to list users", e))?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn update(&self, identity: &Identity) -> Result<Identity, StorageError> {
        let row: Option<IdentityRow> = query_as(
            r#"UPDATE users
               SET username = $2, email = $3, password_hash = $4, updated_at = $5
               WHERE id = $1
               RETURNING id, username, email, password_hash, confirmed, created_at, updated_at"#,
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.updated_at.map(time_to_chrono))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, identity))?;

        row.map(from_row)
            .ok_or_else(|| StorageError::not_found(KIND, &identity.id))
    }

    async fn set_confirmed(&self, id: &str, confirmed: bool) -> Result<(), StorageError> {
        let result = query("UPDATE users SET confirmed = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(confirmed)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to confirm user", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(KIND, id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<Identity, StorageError> {
        let row: Option<IdentityRow> = query_as(
            r#"DELETE FROM users WHERE id = $1
               RETURNING id, username, email, password_hash, confirmed, created_at, updated_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to delete user", e))?;

        row.map(from_row)
            .ok_or_else(|| StorageError::not_found(KIND, id))
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Health check failed", e))?;
        Ok(())
    }
}

/// Registration transaction backed by a native PostgreSQL transaction.
///
/// Concurrent inserts of the same email block on the unique index until the
/// first transaction finishes; the loser then fails with `AlreadyExists`.
/// Dropping without commit rolls back.
pub struct PostgresIdentityTransaction {
    tx: PgTransaction<'static>,
}

#[async_trait]
impl IdentityTransaction for PostgresIdentityTransaction {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<Identity>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE email = $1");
        let row: Option<IdentityRow> = query_as(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| query_error("Failed to read user", e))?;
        Ok(row.map(from_row))
    }

    async fn insert(&mut self, identity: &Identity) -> Result<(), StorageError> {
        query(
            r#"INSERT INTO users (id, username, email, password_hash, confirmed, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.confirmed)
        .bind(time_to_chrono(identity.created_at))
        .bind(identity.updated_at.map(time_to_chrono))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_error(e, identity))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
        })?;
        tracing::debug!("Registration transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
        })?;
        tracing::debug!("Registration transaction rolled back");
        Ok(())
    }
}
