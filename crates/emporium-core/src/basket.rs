//! Shopping baskets, one per owner.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::id::generate_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketItem {
    #[serde(rename = "instrument_id")]
    pub catalog_item_id: String,
    pub quantity: u32,
}

impl BasketItem {
    pub fn validate(&self) -> Result<()> {
        if self.catalog_item_id.trim().is_empty() {
            return Err(CoreError::invalid_field("instrument_id", "must not be empty"));
        }
        if self.quantity == 0 {
            return Err(CoreError::invalid_field("quantity", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub items: Vec<BasketItem>,
}

impl Basket {
    pub fn empty(owner_id: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            owner_id: owner_id.into(),
            items: Vec::new(),
        }
    }

    /// Appends the item, or bumps the quantity if the catalog item is
    /// already in the basket. Insertion order is kept.
    pub fn add_item(&mut self, item: BasketItem) {
        match self
            .items
            .iter_mut()
            .find(|existing| existing.catalog_item_id == item.catalog_item_id)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
    }

    /// Returns `true` if something was removed.
    pub fn remove_item(&mut self, catalog_item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.catalog_item_id != catalog_item_id);
        self.items.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, quantity: u32) -> BasketItem {
        BasketItem {
            catalog_item_id: id.into(),
            quantity,
        }
    }

    #[test]
    fn adding_same_item_increments_quantity() {
        let mut basket = Basket::empty("u1");
        basket.add_item(item("drum", 1));
        basket.add_item(item("bass", 1));
        basket.add_item(item("drum", 2));
        assert_eq!(basket.items, vec![item("drum", 3), item("bass", 1)]);
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let mut basket = Basket::empty("u1");
        basket.add_item(item("drum", 1));
        assert!(!basket.remove_item("bass"));
        assert!(basket.remove_item("drum"));
        assert!(basket.items.is_empty());
    }

    #[test]
    fn zero_quantity_is_invalid() {
        assert!(item("drum", 0).validate().is_err());
        assert!(item("", 1).validate().is_err());
        assert!(item("drum", 1).validate().is_ok());
    }

    #[test]
    fn wire_names() {
        let mut basket = Basket::empty("u1");
        basket.add_item(item("drum", 1));
        let json = serde_json::to_value(&basket).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["items"][0]["instrument_id"], "drum");
    }
}
