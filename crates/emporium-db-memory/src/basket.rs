use async_trait::async_trait;
use emporium_core::{Basket, BasketItem};
use emporium_storage::{BasketStore, StorageError};
use papaya::{Compute, HashMap as PapayaHashMap, Operation};

use crate::ReadCounter;

/// In-memory basket store keyed by owner id, so one basket per owner holds
/// structurally.
#[derive(Debug, Default)]
pub struct InMemoryBasketStore {
    data: PapayaHashMap<String, Basket>,
    reads: ReadCounter,
}

impl InMemoryBasketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }

    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BasketStore for InMemoryBasketStore {
    async fn get_by_owner(&self, owner_id: &str) -> Result<Option<Basket>, StorageError> {
        self.reads.hit();
        Ok(self.data.pin().get(owner_id).cloned())
    }

    async fn add_item(&self, owner_id: &str, item: &BasketItem) -> Result<Basket, StorageError> {
        let map = self.data.pin();
        let stored = map.update_or_insert_with(
            owner_id.to_string(),
            |existing| {
                let mut next = existing.clone();
                next.add_item(item.clone());
                next
            },
            || {
                let mut basket = Basket::empty(owner_id);
                basket.add_item(item.clone());
                basket
            },
        );
        Ok(stored.clone())
    }

    async fn remove_item(
        &self,
        owner_id: &str,
        catalog_item_id: &str,
    ) -> Result<Option<Basket>, StorageError> {
        let map = self.data.pin();
        let result = map.compute(owner_id.to_string(), |entry| {
            let Some((_, existing)) = entry else {
                return Operation::Abort(());
            };
            let mut next = existing.clone();
            if next.remove_item(catalog_item_id) {
                Operation::Insert(next)
            } else {
                Operation::Abort(())
            }
        });
        match result {
            Compute::Updated { new: (_, basket), .. } => Ok(Some(basket.clone())),
            _ => Ok(None),
        }
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<bool, StorageError> {
        Ok(self.data.pin().remove(owner_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn item(id: &str, quantity: u32) -> BasketItem {
        BasketItem {
            catalog_item_id: id.into(),
            quantity,
        }
    }

    #[tokio::test]
    async fn add_creates_the_basket_once_and_keeps_its_id() {
        let store = InMemoryBasketStore::new();
        let first = store.add_item("u1", &item("drum", 1)).await.unwrap();
        let second = store.add_item("u1", &item("drum", 2)).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.items, vec![item("drum", 3)]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remove_reports_missing_items() {
        let store = InMemoryBasketStore::new();
        assert!(store.remove_item("u1", "drum").await.unwrap().is_none());

        store.add_item("u1", &item("drum", 1)).await.unwrap();
        assert!(store.remove_item("u1", "bass").await.unwrap().is_none());

        let stored = store.remove_item("u1", "drum").await.unwrap().unwrap();
        assert!(stored.items.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_adds_are_all_kept() {
        let store = Arc::new(InMemoryBasketStore::new());
        let handles: Vec<_> = (0..200)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.add_item("u1", &item(&format!("i{i}"), 1)).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let basket = store.get_by_owner("u1").await.unwrap().unwrap();
        assert_eq!(basket.items.len(), 200);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemoryBasketStore::new();
        assert!(!store.delete_by_owner("u1").await.unwrap());
        store.add_item("u1", &item("drum", 1)).await.unwrap();
        assert!(store.delete_by_owner("u1").await.unwrap());
        assert!(store.get_by_owner("u1").await.unwrap().is_none());
    }
}
