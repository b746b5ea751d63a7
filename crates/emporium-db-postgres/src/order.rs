use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emporium_core::Order;
use emporium_storage::{OrderStore, StorageError};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use crate::convert::{chrono_to_time, from_json, time_to_chrono, to_json};
use crate::error::{query_error, unique_violation};

const KIND: &str = "order";

type OrderRow = (String, String, Value, DateTime<Utc>);

fn from_row(row: OrderRow) -> Result<Order, StorageError> {
    Ok(Order {
        id: row.0,
        owner_id: row.1,
        items: from_json(row.2)?,
        created_at: chrono_to_time(row.3),
    })
}

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create(&self, order: &Order) -> Result<(), StorageError> {
        let items = to_json(&order.items)?;
        query("INSERT INTO orders (id, user_id, items, created_at) VALUES ($1, $2, $3, $4)")
            .bind(&order.id)
            .bind(&order.owner_id)
            .bind(&items)
            .bind(time_to_chrono(order.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if unique_violation(&e).is_some() {
                    StorageError::already_exists(KIND, "id", &order.id)
                } else {
                    query_error("Failed to create order", e)
                }
            })?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, StorageError> {
        let rows: Vec<OrderRow> = query_as(
            "SELECT id, user_id, items, created_at FROM orders WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to list orders", e))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn delete(&self, order_id: &str, owner_id: &str) -> Result<(), StorageError> {
        let result = query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to delete order", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(KIND, order_id));
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
