//! Wiring shared by the integration tests: in-memory stores, the local
//! cache and recording publishers.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use emporium_db_memory::{
    InMemoryBasketStore, InMemoryCatalogStore, InMemoryIdentityStore, InMemoryOrderStore,
};
use emporium_notifications::{RecordingEmailSender, TemplateRenderer};
use emporium_server::auth::{PasswordError, PasswordHasher, TokenIssuer};
use emporium_server::services::{
    BasketService, CatalogService, IdentityService, IdentityServiceDeps, OrderService,
};
use emporium_server::{
    CacheAside, CacheBackend, CacheTtls, EventEmitter, OwnerValidator, RecordingPublisher,
    ValidatorError,
};

pub const TOKEN_SECRET: &str = "test-secret-0123456789";

/// Stores the password in the clear. Argon2 is too slow for tests.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(password)
    }
}

pub struct IdentityHarness {
    pub service: Arc<IdentityService>,
    pub store: Arc<InMemoryIdentityStore>,
    pub cache: CacheAside,
    pub events: RecordingPublisher,
    pub email: RecordingEmailSender,
}

pub fn identity() -> IdentityHarness {
    identity_with_ttls(CacheTtls::default())
}

/// [`PlainHasher`] that takes `delay` per call, to widen race windows.
pub struct SlowHasher {
    pub delay: Duration,
}

impl PasswordHasher for SlowHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        std::thread::sleep(self.delay);
        PlainHasher.hash(password)
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        std::thread::sleep(self.delay);
        PlainHasher.verify(password, hash)
    }
}

pub fn identity_with_ttls(ttls: CacheTtls) -> IdentityHarness {
    identity_with(ttls, Arc::new(PlainHasher))
}

pub fn identity_with_hasher(hasher: Arc<dyn PasswordHasher>) -> IdentityHarness {
    identity_with(CacheTtls::default(), hasher)
}

fn identity_with(ttls: CacheTtls, hasher: Arc<dyn PasswordHasher>) -> IdentityHarness {
    let store = Arc::new(InMemoryIdentityStore::new());
    let cache = CacheAside::new(CacheBackend::new_local());
    let events = RecordingPublisher::new();
    let email = RecordingEmailSender::new();

    let service = IdentityService::new(IdentityServiceDeps {
        store: store.clone(),
        cache: cache.clone(),
        ttls,
        code_ttl: Duration::from_secs(15 * 60),
        events: EventEmitter::new(Arc::new(events.clone())),
        email: Arc::new(email.clone()),
        templates: TemplateRenderer::with_defaults(),
        hasher,
        tokens: TokenIssuer::new(TOKEN_SECRET, Duration::from_secs(3600)),
    });

    IdentityHarness {
        service: Arc::new(service),
        store,
        cache,
        events,
        email,
    }
}

pub struct CatalogHarness {
    pub service: Arc<CatalogService>,
    pub store: Arc<InMemoryCatalogStore>,
    pub events: RecordingPublisher,
}

pub fn catalog() -> CatalogHarness {
    let store = Arc::new(InMemoryCatalogStore::new());
    let events = RecordingPublisher::new();
    let service = CatalogService::new(
        store.clone(),
        CacheAside::new(CacheBackend::new_local()),
        CacheTtls::default(),
        EventEmitter::new(Arc::new(events.clone())),
    );
    CatalogHarness {
        service: Arc::new(service),
        store,
        events,
    }
}

pub struct BasketHarness {
    pub service: Arc<BasketService>,
    pub store: Arc<InMemoryBasketStore>,
    pub events: RecordingPublisher,
}

pub fn basket() -> BasketHarness {
    let store = Arc::new(InMemoryBasketStore::new());
    let events = RecordingPublisher::new();
    let service = BasketService::new(
        store.clone(),
        CacheAside::new(CacheBackend::new_local()),
        CacheTtls::default().basket,
        EventEmitter::new(Arc::new(events.clone())),
    );
    BasketHarness {
        service: Arc::new(service),
        store,
        events,
    }
}

/// Knows a fixed set of users and counts how often it was asked.
#[derive(Default)]
pub struct StaticOwners {
    known: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticOwners {
    pub fn new(known: &[&str]) -> Self {
        Self {
            known: known.iter().map(|id| id.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OwnerValidator for StaticOwners {
    async fn exists(&self, owner_id: &str) -> Result<bool, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.known.contains(owner_id))
    }
}

/// An identity service that cannot be reached.
pub struct UnreachableOwners;

#[async_trait]
impl OwnerValidator for UnreachableOwners {
    async fn exists(&self, _owner_id: &str) -> Result<bool, ValidatorError> {
        Err(ValidatorError::Transport("connection refused".into()))
    }
}

pub struct OrderHarness {
    pub service: Arc<OrderService>,
    pub store: Arc<InMemoryOrderStore>,
    pub events: RecordingPublisher,
}

pub fn orders(owners: Arc<dyn OwnerValidator>) -> OrderHarness {
    let store = Arc::new(InMemoryOrderStore::new());
    let events = RecordingPublisher::new();
    let service = OrderService::new(
        store.clone(),
        CacheAside::new(CacheBackend::new_local()),
        CacheTtls::default(),
        EventEmitter::new(Arc::new(events.clone())),
        owners,
    );
    OrderHarness {
        service: Arc::new(service),
        store,
        events,
    }
}
