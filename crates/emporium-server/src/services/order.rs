//! Order service.
//!
//! Every operation first asks the identity service whether the owner
//! exists, and does nothing else if it does not.

use std::sync::Arc;

use async_trait::async_trait;
use emporium_core::{NewOrder, Order, validate_id};
use emporium_storage::OrderStore;

use super::HealthProbe;
use crate::cache::{CacheAside, CacheTtls, EntityKind};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{Event, EventEmitter, OrderEvent};
use crate::validator::OwnerValidator;

const KIND: EntityKind = EntityKind::Order;

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cache: CacheAside,
    ttls: CacheTtls,
    events: EventEmitter,
    owners: Arc<dyn OwnerValidator>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: CacheAside,
        ttls: CacheTtls,
        events: EventEmitter,
        owners: Arc<dyn OwnerValidator>,
    ) -> Self {
        Self {
            store,
            cache,
            ttls,
            events,
            owners,
        }
    }

    async fn ensure_owner(&self, owner_id: &str) -> ServiceResult<()> {
        validate_id(owner_id)?;
        if self.owners.exists(owner_id).await? {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "user '{owner_id}' does not exist"
            )))
        }
    }

    #[tracing::instrument(skip(self, new), fields(user_id = %new.owner_id))]
    pub async fn create(&self, new: NewOrder) -> ServiceResult<Order> {
        new.validate()?;
        self.ensure_owner(&new.owner_id).await?;

        let order = Order::new(new);
        self.store.create(&order).await?;

        self.cache
            .invalidate_all(KIND.owned_mutation_keys(&order.id, &order.owner_id))
            .await;
        self.events.emit(Event::OrderCreated(OrderEvent {
            order_id: order.id.clone(),
            user_id: order.owner_id.clone(),
        }));
        tracing::info!(order_id = %order.id, "order created");
        Ok(order)
    }

    /// The owner's orders, oldest first.
    pub async fn list(&self, owner_id: &str) -> ServiceResult<Vec<Order>> {
        self.ensure_owner(owner_id).await?;
        self.cache
            .get(&KIND.owner_key(owner_id), self.ttls.list, move || {
                self.load_owned(owner_id)
            })
            .await
    }

    async fn load_owned(&self, owner_id: &str) -> ServiceResult<Vec<Order>> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    pub async fn delete(&self, owner_id: &str, order_id: &str) -> ServiceResult<()> {
        validate_id(order_id)?;
        self.ensure_owner(owner_id).await?;
        self.store.delete(order_id, owner_id).await?;

        self.cache
            .invalidate_all(KIND.owned_mutation_keys(order_id, owner_id))
            .await;
        self.events.emit(Event::OrderDeleted(OrderEvent {
            order_id: order_id.to_string(),
            user_id: owner_id.to_string(),
        }));
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for OrderService {
    async fn ready(&self) -> ServiceResult<()> {
        Ok(self.store.health_check().await?)
    }
}
