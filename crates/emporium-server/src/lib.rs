//! Emporium services: identity, catalog, basket and order, plus an events
//! consumer. One binary runs one of them, chosen by `service.kind`.
//!
//! - [`cache`]: read-through caching and invalidation
//! - [`events`]: fire-and-forget domain events over NATS JetStream
//! - [`validator`]: owner existence checks against the identity service
//! - [`services`]: the four services
//! - [`api`]: their HTTP routes

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod services;
pub mod validator;

pub use cache::{CacheAside, CacheBackend, CacheTtls, EntityKind, create_cache_backend};
pub use config::{AppConfig, RedisConfig, ServiceKind};
pub use error::{ServiceError, ServiceResult};
pub use events::{Event, EventEmitter, EventPublisher, RecordingPublisher};
pub use server::{EmporiumServer, ServerBuilder, build_app};
pub use validator::{HttpOwnerValidator, OwnerValidator, ValidatorError};
