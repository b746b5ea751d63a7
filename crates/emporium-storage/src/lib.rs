//! # emporium-storage
//!
//! Store abstraction for the Emporium services.
//!
//! One trait per entity kind: [`IdentityStore`], [`CatalogStore`],
//! [`BasketStore`] and [`OrderStore`]. Backends live in separate crates
//! (`emporium-db-memory`, `emporium-db-postgres`). Uniqueness constraints
//! (identity email and username, catalog item name, one basket per owner)
//! are the backend's job and surface as [`StorageError::AlreadyExists`].
//!
//! Registration needs an atomic check-then-insert, which is what
//! [`IdentityTransaction`] is for:
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! if tx.find_by_email(&email).await?.is_some() {
//!     tx.rollback().await?;
//!     return Err(StorageError::already_exists("user", &email));
//! }
//! tx.insert(&identity).await?;
//! tx.commit().await?;
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::{BasketStore, CatalogStore, IdentityStore, IdentityTransaction, OrderStore};
