//! Basket service: one cart per user.
//!
//! Item changes are single atomic store operations, so concurrent changes
//! to the same cart all land.

use std::sync::Arc;

use async_trait::async_trait;
use emporium_core::{Basket, BasketItem, validate_id};
use emporium_storage::BasketStore;

use super::HealthProbe;
use crate::cache::{CacheAside, EntityKind};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{CartEvent, CartItemEvent, Event, EventEmitter};

const KIND: EntityKind = EntityKind::Cart;

pub struct BasketService {
    store: Arc<dyn BasketStore>,
    cache: CacheAside,
    ttl: std::time::Duration,
    events: EventEmitter,
}

impl BasketService {
    pub fn new(
        store: Arc<dyn BasketStore>,
        cache: CacheAside,
        ttl: std::time::Duration,
        events: EventEmitter,
    ) -> Self {
        Self {
            store,
            cache,
            ttl,
            events,
        }
    }

    /// The owner's basket; an empty one if they have none yet.
    pub async fn get(&self, owner_id: &str) -> ServiceResult<Basket> {
        validate_id(owner_id)?;
        self.cache
            .get(&KIND.key(owner_id), self.ttl, move || self.load(owner_id))
            .await
    }

    async fn load(&self, owner_id: &str) -> ServiceResult<Basket> {
        Ok(self
            .store
            .get_by_owner(owner_id)
            .await?
            .unwrap_or_else(|| Basket::empty(owner_id)))
    }

    /// Adds an item, or increases its quantity if it is already there.
    pub async fn add_item(&self, owner_id: &str, item: BasketItem) -> ServiceResult<Basket> {
        validate_id(owner_id)?;
        item.validate()?;

        let stored = self.store.add_item(owner_id, &item).await?;

        self.invalidate(owner_id).await;
        self.events.emit(Event::CartUpdated(CartItemEvent {
            user_id: owner_id.to_string(),
            instrument_id: item.catalog_item_id,
        }));
        Ok(stored)
    }

    pub async fn remove_item(&self, owner_id: &str, instrument_id: &str) -> ServiceResult<Basket> {
        validate_id(owner_id)?;

        let stored = self
            .store
            .remove_item(owner_id, instrument_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found(format!("instrument '{instrument_id}' is not in the cart"))
            })?;

        self.invalidate(owner_id).await;
        self.events.emit(Event::CartUpdated(CartItemEvent {
            user_id: owner_id.to_string(),
            instrument_id: instrument_id.to_string(),
        }));
        Ok(stored)
    }

    /// Removes every item. Clearing a cart that does not exist is a no-op.
    pub async fn clear(&self, owner_id: &str) -> ServiceResult<()> {
        validate_id(owner_id)?;
        let existed = self.store.delete_by_owner(owner_id).await?;

        self.invalidate(owner_id).await;
        self.events.emit(Event::CartCleared(CartEvent {
            user_id: owner_id.to_string(),
        }));
        tracing::debug!(user_id = %owner_id, existed, "cart cleared");
        Ok(())
    }

    pub async fn flush_cache(&self) -> ServiceResult<u64> {
        Ok(self.cache.flush(&KIND.prefix()).await?)
    }

    async fn invalidate(&self, owner_id: &str) {
        self.cache.invalidate_all(KIND.mutation_keys(owner_id)).await;
    }
}

#[async_trait]
impl HealthProbe for BasketService {
    async fn ready(&self) -> ServiceResult<()> {
        Ok(self.store.health_check().await?)
    }
}
