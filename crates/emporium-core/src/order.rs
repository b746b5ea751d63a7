//! Orders.
//!
//! Line items reference catalog items by id only; nothing checks that the
//! referenced item still exists.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CoreError, Result, require_non_empty};
use crate::id::generate_id;
use crate::time::now_utc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "instrument_id")]
    pub catalog_item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub items: Vec<OrderItem>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Order {
    pub fn new(order: NewOrder) -> Self {
        Self {
            id: generate_id(),
            owner_id: order.owner_id,
            items: order.items,
            created_at: now_utc(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("user_id", &self.owner_id)?;
        if self.items.is_empty() {
            return Err(CoreError::invalid_field("items", "order must have at least one item"));
        }
        for item in &self.items {
            require_non_empty("instrument_id", &item.catalog_item_id)?;
            if item.quantity == 0 {
                return Err(CoreError::invalid_field("quantity", "must be positive"));
            }
        }
        Ok(())
    }
}
