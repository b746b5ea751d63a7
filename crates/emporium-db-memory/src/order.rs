use async_trait::async_trait;
use emporium_core::Order;
use emporium_storage::{OrderStore, StorageError};
use papaya::HashMap as PapayaHashMap;

use crate::ReadCounter;

const KIND: &str = "order";

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    data: PapayaHashMap<String, Order>,
    reads: ReadCounter,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }

    /// Total number of stored orders across all owners.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<(), StorageError> {
        let map = self.data.pin();
        if map.contains_key(&order.id) {
            return Err(StorageError::already_exists(KIND, "id", &order.id));
        }
        map.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, StorageError> {
        self.reads.hit();
        let mut orders: Vec<Order> = self
            .data
            .pin()
            .iter()
            .filter(|(_, order)| order.owner_id == owner_id)
            .map(|(_, order)| order.clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn delete(&self, order_id: &str, owner_id: &str) -> Result<(), StorageError> {
        let map = self.data.pin();
        match map.get(order_id) {
            Some(order) if order.owner_id == owner_id => {
                map.remove(order_id);
                Ok(())
            }
            _ => Err(StorageError::not_found(KIND, order_id)),
        }
    }
}
