//! The four services. Each owns its store, the shared cache and the event
//! emitter, and is shared between request handlers behind an `Arc`.

pub mod basket;
pub mod catalog;
pub mod identity;
pub mod order;

use async_trait::async_trait;

pub use basket::BasketService;
pub use catalog::CatalogService;
pub use identity::{
    ConfirmRequest, ConfirmResponse, IdentityService, IdentityServiceDeps, LoginRequest,
    LoginResponse, RegisterResponse,
};
pub use order::OrderService;

use crate::error::ServiceResult;

/// Readiness of a service's backing store.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ready(&self) -> ServiceResult<()>;
}
