use async_trait::async_trait;
use emporium_core::{Basket, BasketItem, generate_id};
use emporium_storage::{BasketStore, StorageError};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgTransaction};

use crate::convert::{from_json, to_json};
use crate::error::query_error;

type BasketRow = (String, String, Value);

fn from_row(row: BasketRow) -> Result<Basket, StorageError> {
    Ok(Basket {
        id: row.0,
        owner_id: row.1,
        items: from_json(row.2)?,
    })
}

/// Cart store. `carts.user_id` carries a unique index, so concurrent first
/// writes for the same owner converge on one row. Item changes lock that row
/// for the length of a transaction.
#[derive(Debug, Clone)]
pub struct PostgresBasketStore {
    pool: PgPool,
}

impl PostgresBasketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PostgresBasketStore {
    async fn begin(&self) -> Result<PgTransaction<'static>, StorageError> {
        self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })
    }
}

async fn lock_cart(
    tx: &mut PgTransaction<'static>,
    owner_id: &str,
) -> Result<Option<Basket>, StorageError> {
    let row: Option<BasketRow> =
        query_as("SELECT id, user_id, items FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(owner_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| query_error("Failed to lock cart", e))?;
    row.map(from_row).transpose()
}

async fn write_items(tx: &mut PgTransaction<'static>, basket: &Basket) -> Result<(), StorageError> {
    query("UPDATE carts SET items = $2 WHERE user_id = $1")
        .bind(&basket.owner_id)
        .bind(to_json(&basket.items)?)
        .execute(&mut **tx)
        .await
        .map_err(|e| query_error("Failed to write cart", e))?;
    Ok(())
}

async fn commit(tx: PgTransaction<'static>) -> Result<(), StorageError> {
    tx.commit()
        .await
        .map_err(|e| StorageError::transaction_error(format!("Failed to commit cart: {e}")))
}

#[async_trait]
impl BasketStore for PostgresBasketStore {
    async fn get_by_owner(&self, owner_id: &str) -> Result<Option<Basket>, StorageError> {
        let row: Option<BasketRow> =
            query_as("SELECT id, user_id, items FROM carts WHERE user_id = $1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("Failed to read cart", e))?;
        row.map(from_row).transpose()
    }

    async fn add_item(&self, owner_id: &str, item: &BasketItem) -> Result<Basket, StorageError> {
        let mut tx = self.begin().await?;
        query(
            r#"INSERT INTO carts (id, user_id, items) VALUES ($1, $2, '[]'::jsonb)
               ON CONFLICT (user_id) DO NOTHING"#,
        )
        .bind(generate_id())
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to create cart", e))?;

        let mut basket = lock_cart(&mut tx, owner_id)
            .await?
            .ok_or_else(|| StorageError::transaction_error("cart vanished inside its transaction"))?;
        basket.add_item(item.clone());
        write_items(&mut tx, &basket).await?;
        commit(tx).await?;
        Ok(basket)
    }

    async fn remove_item(
        &self,
        owner_id: &str,
        catalog_item_id: &str,
    ) -> Result<Option<Basket>, StorageError> {
        let mut tx = self.begin().await?;
        let Some(mut basket) = lock_cart(&mut tx, owner_id).await? else {
            return Ok(None);
        };
        if !basket.remove_item(catalog_item_id) {
            return Ok(None);
        }
        write_items(&mut tx, &basket).await?;
        commit(tx).await?;
        Ok(Some(basket))
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<bool, StorageError> {
        let result = query("DELETE FROM carts WHERE user_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to delete cart", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Health check failed", e))?;
        Ok(())
    }
}
