pub mod basket;
pub mod catalog;
pub mod error;
pub mod id;
pub mod identity;
pub mod order;
pub mod time;

pub use basket::{Basket, BasketItem};
pub use catalog::{CatalogItem, CatalogItemPatch, NewCatalogItem};
pub use error::{CoreError, Result};
pub use id::{generate_id, validate_id};
pub use identity::{Identity, IdentityPatch, IdentityProfile, Registration, validate_email};
pub use order::{NewOrder, Order, OrderItem};
pub use time::now_utc;
