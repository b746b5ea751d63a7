//! Catalog service: instruments.

use std::sync::Arc;

use async_trait::async_trait;
use emporium_core::{CatalogItem, CatalogItemPatch, NewCatalogItem, validate_id};
use emporium_storage::CatalogStore;

use super::HealthProbe;
use crate::cache::{CacheAside, CacheTtls, EntityKind};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{Event, EventEmitter, InstrumentEvent};

const KIND: EntityKind = EntityKind::Instrument;

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    cache: CacheAside,
    ttls: CacheTtls,
    events: EventEmitter,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: CacheAside,
        ttls: CacheTtls,
        events: EventEmitter,
    ) -> Self {
        Self {
            store,
            cache,
            ttls,
            events,
        }
    }

    pub async fn create(&self, new: NewCatalogItem) -> ServiceResult<CatalogItem> {
        new.validate()?;
        let item = CatalogItem::new(new);
        self.store.create(&item).await?;

        self.cache.invalidate_all(KIND.mutation_keys(&item.id)).await;
        self.events
            .emit(Event::InstrumentCreated(InstrumentEvent { id: item.id.clone() }));
        tracing::info!(id = %item.id, name = %item.name, "instrument created");
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<CatalogItem> {
        validate_id(id)?;
        self.cache
            .get(&KIND.key(id), self.ttls.entity, move || self.load(id))
            .await
    }

    async fn load(&self, id: &str) -> ServiceResult<CatalogItem> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("instrument '{id}' not found")))
    }

    /// Looks an instrument up by its unique name. Not cached.
    pub async fn get_by_name(&self, name: &str) -> ServiceResult<CatalogItem> {
        self.store
            .find_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("instrument named '{name}' not found")))
    }

    pub async fn list(&self) -> ServiceResult<Vec<CatalogItem>> {
        self.cache
            .get(&KIND.all_key(), self.ttls.list, move || self.load_all())
            .await
    }

    async fn load_all(&self) -> ServiceResult<Vec<CatalogItem>> {
        Ok(self.store.list().await?)
    }

    pub async fn update(&self, id: &str, patch: CatalogItemPatch) -> ServiceResult<CatalogItem> {
        validate_id(id)?;
        patch.validate()?;

        let mut item = self.load(id).await?;
        item.apply(patch);
        self.store.update(&item).await?;

        self.cache.invalidate_all(KIND.mutation_keys(id)).await;
        self.events
            .emit(Event::InstrumentUpdated(InstrumentEvent { id: id.to_string() }));
        Ok(item)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        validate_id(id)?;
        self.store.delete(id).await?;

        self.cache.invalidate_all(KIND.mutation_keys(id)).await;
        self.events
            .emit(Event::InstrumentDeleted(InstrumentEvent { id: id.to_string() }));
        tracing::info!(id = %id, "instrument deleted");
        Ok(())
    }

    pub async fn flush_cache(&self) -> ServiceResult<u64> {
        Ok(self.cache.flush(&KIND.prefix()).await?)
    }
}

#[async_trait]
impl HealthProbe for CatalogService {
    async fn ready(&self) -> ServiceResult<()> {
        Ok(self.store.health_check().await?)
    }
}
