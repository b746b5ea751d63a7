use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use emporium_core::Identity;
use emporium_storage::{IdentityStore, IdentityTransaction, StorageError};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::ReadCounter;

const KIND: &str = "user";

/// In-memory identity store.
///
/// Registration transactions are serialized through a single lock, and
/// uniqueness is checked again at commit so that plain updates racing with
/// a registration cannot sneak a duplicate email in.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    data: Arc<RwLock<HashMap<String, Identity>>>,
    registration: Arc<Mutex<()>>,
    reads: ReadCounter,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reads served so far (transactions excluded).
    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

fn check_unique(
    data: &HashMap<String, Identity>,
    candidate: &Identity,
) -> Result<(), StorageError> {
    for existing in data.values().filter(|i| i.id != candidate.id) {
        if existing.email == candidate.email {
            return Err(StorageError::already_exists(KIND, "email", &candidate.email));
        }
        if existing.username == candidate.username {
            return Err(StorageError::already_exists(
                KIND,
                "username",
                &candidate.username,
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn begin(&self) -> Result<Box<dyn IdentityTransaction>, StorageError> {
        let guard = Arc::clone(&self.registration).lock_owned().await;
        Ok(Box::new(InMemoryIdentityTransaction {
            data: Arc::clone(&self.data),
            pending: Vec::new(),
            _guard: guard,
        }))
    }

    async fn get(&self, id: &str) -> Result<Option<Identity>, StorageError> {
        self.reads.hit();
        Ok(self.data.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StorageError> {
        self.reads.hit();
        let data = self.data.read().await;
        Ok(data.values().find(|i| i.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<Identity>, StorageError> {
        self.reads.hit();
        let data = self.data.read().await;
        let mut all: Vec<Identity> = data.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn update(&self, identity: &Identity) -> Result<Identity, StorageError> {
        let mut data = self.data.write().await;
        check_unique(&data, identity)?;
        let stored = data
            .get_mut(&identity.id)
            .ok_or_else(|| StorageError::not_found(KIND, &identity.id))?;
        stored.username.clone_from(&identity.username);
        stored.email.clone_from(&identity.email);
        stored.password_hash.clone_from(&identity.password_hash);
        stored.updated_at = identity.updated_at;
        Ok(stored.clone())
    }

    async fn set_confirmed(&self, id: &str, confirmed: bool) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        let identity = data
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(KIND, id))?;
        identity.confirmed = confirmed;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<Identity, StorageError> {
        self.data
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StorageError::not_found(KIND, id))
    }
}

/// Buffered registration transaction. Holds the registration lock until it
/// is committed, rolled back or dropped.
pub struct InMemoryIdentityTransaction {
    data: Arc<RwLock<HashMap<String, Identity>>>,
    pending: Vec<Identity>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl IdentityTransaction for InMemoryIdentityTransaction {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<Identity>, StorageError> {
        if let Some(pending) = self.pending.iter().find(|i| i.email == email) {
            return Ok(Some(pending.clone()));
        }
        let data = self.data.read().await;
        Ok(data.values().find(|i| i.email == email).cloned())
    }

    async fn insert(&mut self, identity: &Identity) -> Result<(), StorageError> {
        if self.pending.iter().any(|p| p.email == identity.email) {
            return Err(StorageError::already_exists(KIND, "email", &identity.email));
        }
        {
            let data = self.data.read().await;
            if data.contains_key(&identity.id) {
                return Err(StorageError::already_exists(KIND, "id", &identity.id));
            }
            check_unique(&data, identity)?;
        }
        self.pending.push(identity.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemoryIdentityTransaction { data, pending, _guard } = *self;
        let mut map = data.write().await;
        for identity in &pending {
            check_unique(&map, identity)?;
        }
        for identity in pending {
            map.insert(identity.id.clone(), identity);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> Identity {
        Identity::new("ada", "ada@example.com", "hash")
    }

    #[tokio::test]
    async fn insert_is_invisible_until_commit() {
        let store = InMemoryIdentityStore::new();
        let identity = ada();

        let mut tx = store.begin().await.unwrap();
        tx.insert(&identity).await.unwrap();
        assert!(tx.find_by_email("ada@example.com").await.unwrap().is_some());
        assert!(store.get(&identity.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(store.get(&identity.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = InMemoryIdentityStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert(&ada()).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn dropped_transaction_releases_the_lock() {
        let store = InMemoryIdentityStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&ada()).await.unwrap();
        }
        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = InMemoryIdentityStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert(&ada()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert(&Identity::new("ada", "other@example.com", "hash"))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn update_checks_uniqueness_and_existence() {
        let store = InMemoryIdentityStore::new();
        let first = ada();
        let second = Identity::new("grace", "grace@example.com", "hash");
        for identity in [&first, &second] {
            let mut tx = store.begin().await.unwrap();
            tx.insert(identity).await.unwrap();
            tx.commit().await.unwrap();
        }

        let mut clash = second.clone();
        clash.email = first.email.clone();
        assert!(store.update(&clash).await.unwrap_err().is_already_exists());

        let ghost = Identity::new("ghost", "ghost@example.com", "hash");
        assert!(store.update(&ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_keeps_the_stored_confirmation_flag() {
        let store = InMemoryIdentityStore::new();
        let identity = ada();
        let mut tx = store.begin().await.unwrap();
        tx.insert(&identity).await.unwrap();
        tx.commit().await.unwrap();

        let mut stale = store.get(&identity.id).await.unwrap().unwrap();
        store.set_confirmed(&identity.id, true).await.unwrap();

        stale.username = "lovelace".into();
        let stored = store.update(&stale).await.unwrap();
        assert!(stored.confirmed);
        assert_eq!(stored.username, "lovelace");
        assert!(store.get(&identity.id).await.unwrap().unwrap().confirmed);
    }

    #[tokio::test]
    async fn reads_are_counted() {
        let store = InMemoryIdentityStore::new();
        store.get("missing").await.unwrap();
        store.list().await.unwrap();
        assert_eq!(store.read_count(), 2);
    }
}
