use std::collections::HashMap;

use async_trait::async_trait;
use emporium_core::CatalogItem;
use emporium_storage::{CatalogStore, StorageError};
use tokio::sync::RwLock;

use crate::ReadCounter;

const KIND: &str = "instrument";

/// In-memory catalog store. Item names are unique.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    data: RwLock<HashMap<String, CatalogItem>>,
    reads: ReadCounter,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }
}

fn check_name(data: &HashMap<String, CatalogItem>, item: &CatalogItem) -> Result<(), StorageError> {
    if data.values().any(|i| i.id != item.id && i.name == item.name) {
        return Err(StorageError::already_exists(KIND, "name", &item.name));
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create(&self, item: &CatalogItem) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if data.contains_key(&item.id) {
            return Err(StorageError::already_exists(KIND, "id", &item.id));
        }
        check_name(&data, item)?;
        data.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<CatalogItem>, StorageError> {
        self.reads.hit();
        Ok(self.data.read().await.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CatalogItem>, StorageError> {
        self.reads.hit();
        let data = self.data.read().await;
        Ok(data.values().find(|i| i.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<CatalogItem>, StorageError> {
        self.reads.hit();
        let data = self.data.read().await;
        let mut items: Vec<CatalogItem> = data.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn update(&self, item: &CatalogItem) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if !data.contains_key(&item.id) {
            return Err(StorageError::not_found(KIND, &item.id));
        }
        check_name(&data, item)?;
        data.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(KIND, id))
    }
}
