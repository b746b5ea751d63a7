//! In-memory storage backend.
//!
//! Used by tests and for running a service without Postgres. Every store
//! counts its reads so tests can tell a cache hit from a store round-trip.

mod basket;
mod catalog;
mod identity;
mod order;

pub use basket::InMemoryBasketStore;
pub use catalog::InMemoryCatalogStore;
pub use identity::{InMemoryIdentityStore, InMemoryIdentityTransaction};
pub use order::InMemoryOrderStore;

use std::sync::atomic::{AtomicU64, Ordering};

/// Counts store reads.
#[derive(Debug, Default)]
pub(crate) struct ReadCounter(AtomicU64);

impl ReadCounter {
    pub(crate) fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
