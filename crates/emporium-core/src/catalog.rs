//! Catalog items (instruments).

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result, require_non_empty};
use crate::id::generate_id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
}

impl CatalogItem {
    pub fn new(item: NewCatalogItem) -> Self {
        Self {
            id: generate_id(),
            name: item.name,
            description: item.description,
            price: item.price,
        }
    }

    pub fn apply(&mut self, patch: CatalogItemPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

impl NewCatalogItem {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        validate_price(self.price)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl CatalogItemPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(CoreError::invalid_field(
            "price",
            "must be a non-negative number",
        ));
    }
    Ok(())
}
