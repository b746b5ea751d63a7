//! Store traits implemented by every storage backend.

use async_trait::async_trait;
use emporium_core::{Basket, BasketItem, CatalogItem, Identity, Order};

use crate::error::StorageError;

/// Identity (user) persistence.
///
/// `email` and `username` are unique. Updates that collide with another
/// identity fail with [`StorageError::AlreadyExists`].
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Starts a transaction for the registration check-then-insert.
    ///
    /// Two concurrent transactions that both insert the same email must not
    /// both commit.
    async fn begin(&self) -> Result<Box<dyn IdentityTransaction>, StorageError>;

    async fn get(&self, id: &str) -> Result<Option<Identity>, StorageError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StorageError>;

    async fn list(&self) -> Result<Vec<Identity>, StorageError>;

    /// Writes username, email, password hash and `updated_at` of the stored
    /// identity with the same id and returns the stored row. The
    /// confirmation flag is left as stored; only
    /// [`set_confirmed`](IdentityStore::set_confirmed) changes it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `AlreadyExists` on a uniqueness clash.
    async fn update(&self, identity: &Identity) -> Result<Identity, StorageError>;

    /// Sets the confirmation flag.
    async fn set_confirmed(&self, id: &str, confirmed: bool) -> Result<(), StorageError>;

    /// Deletes the identity and returns what was removed.
    async fn delete(&self, id: &str) -> Result<Identity, StorageError>;

    /// Cheap reachability probe for readiness checks.
    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// A registration transaction.
///
/// Nothing inserted through the transaction is visible to other readers
/// until [`commit`](IdentityTransaction::commit) returns. Dropping the
/// transaction without committing discards its writes.
#[async_trait]
pub trait IdentityTransaction: Send {
    /// Looks up an identity by email, seeing this transaction's own writes.
    async fn find_by_email(&mut self, email: &str) -> Result<Option<Identity>, StorageError>;

    async fn insert(&mut self, identity: &Identity) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Catalog item persistence. `name` is unique.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create(&self, item: &CatalogItem) -> Result<(), StorageError>;

    async fn get(&self, id: &str) -> Result<Option<CatalogItem>, StorageError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<CatalogItem>, StorageError>;

    async fn list(&self) -> Result<Vec<CatalogItem>, StorageError>;

    async fn update(&self, item: &CatalogItem) -> Result<(), StorageError>;

    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Basket persistence, at most one basket per owner.
#[async_trait]
pub trait BasketStore: Send + Sync {
    async fn get_by_owner(&self, owner_id: &str) -> Result<Option<Basket>, StorageError>;

    /// Adds `item` to the owner's basket, creating the basket if needed.
    /// An item already present has its quantity increased.
    ///
    /// The change is atomic per owner: concurrent calls never lose each
    /// other's items. Returns the stored basket.
    async fn add_item(&self, owner_id: &str, item: &BasketItem) -> Result<Basket, StorageError>;

    /// Removes the catalog item from the owner's basket, atomically.
    ///
    /// `Ok(None)` if the owner has no basket or the item is not in it.
    async fn remove_item(
        &self,
        owner_id: &str,
        catalog_item_id: &str,
    ) -> Result<Option<Basket>, StorageError>;

    /// Removes the owner's basket. Returns `false` if there was none.
    async fn delete_by_owner(&self, owner_id: &str) -> Result<bool, StorageError>;

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Order persistence. Orders are indexed by owner; nothing is unique.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), StorageError>;

    /// Orders of one owner, oldest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, StorageError>;

    /// Deletes an order only if it belongs to `owner_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no order with that id belongs to the owner.
    async fn delete(&self, order_id: &str, owner_id: &str) -> Result<(), StorageError>;

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
