use async_trait::async_trait;
use emporium_core::CatalogItem;
use emporium_storage::{CatalogStore, StorageError};
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use crate::error::{query_error, unique_violation};
use crate::schema::INSTRUMENTS_NAME_KEY;

const KIND: &str = "instrument";

type CatalogRow = (String, String, String, f64);

fn from_row(row: CatalogRow) -> CatalogItem {
    CatalogItem {
        id: row.0,
        name: row.1,
        description: row.2,
        price: row.3,
    }
}

fn write_error(err: SqlxError, item: &CatalogItem) -> StorageError {
    match unique_violation(&err).as_deref() {
        Some(INSTRUMENTS_NAME_KEY) => StorageError::already_exists(KIND, "name", &item.name),
        Some(_) => StorageError::already_exists(KIND, "id", &item.id),
        None => query_error("Failed to write instrument", err),
    }
}

#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn create(&self, item: &CatalogItem) -> Result<(), StorageError> {
        query("INSERT INTO instruments (id, name, description, price) VALUES ($1, $2, $3, $4)")
            .bind(&item.id)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.price)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, item))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<CatalogItem>, StorageError> {
        let row: Option<CatalogRow> =
            query_as("SELECT id, name, description, price FROM instruments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("Failed to read instrument", e))?;
        Ok(row.map(from_row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CatalogItem>, StorageError> {
        let row: Option<CatalogRow> =
            query_as("SELECT id, name, description, price FROM instruments WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("Failed to read instrument", e))?;
        Ok(row.map(from_row))
    }

    async fn list(&self) -> Result<Vec<CatalogItem>, StorageError> {
        let rows: Vec<CatalogRow> =
            query_as("SELECT id, name, description, price FROM instruments ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| query_error("Failed to list instruments", e))?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn update(&self, item: &CatalogItem) -> Result<(), StorageError> {
        let result = query(
            "UPDATE instruments SET name = $2, description = $3, price = $4 WHERE id = $1",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, item))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(KIND, &item.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let result = query("DELETE FROM instruments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to delete instrument", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(KIND, id));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Health check failed", e))?;
        Ok(())
    }
}
