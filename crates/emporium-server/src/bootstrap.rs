//! Builds the configured service and its shared clients.
//!
//! Every client (store pool, cache, broker, HTTP client) is created once
//! here and handed to the service explicitly.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use emporium_db_memory::{
    InMemoryBasketStore, InMemoryCatalogStore, InMemoryIdentityStore, InMemoryOrderStore,
};
use emporium_db_postgres::PostgresStores;
use emporium_notifications::{EmailSender, LogEmailSender, SmtpEmailSender, TemplateRenderer};
use emporium_storage::{BasketStore, CatalogStore, IdentityStore, OrderStore};

use crate::api;
use crate::auth::{Argon2PasswordHasher, TokenIssuer};
use crate::cache::{CacheAside, create_cache_backend};
use crate::config::{AppConfig, ServiceKind, StorageBackend};
use crate::events::{EventEmitter, EventPublisher, LogPublisher, NatsPublisher};
use crate::services::{
    BasketService, CatalogService, HealthProbe, IdentityService, IdentityServiceDeps, OrderService,
};
use crate::validator::HttpOwnerValidator;

enum Stores {
    Memory,
    Postgres(PostgresStores),
}

impl Stores {
    async fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        match cfg.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage, data is lost on restart");
                Ok(Stores::Memory)
            }
            StorageBackend::Postgres => {
                let stores = PostgresStores::connect(&cfg.storage.postgres)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                Ok(Stores::Postgres(stores))
            }
        }
    }

    fn identity(&self) -> Arc<dyn IdentityStore> {
        match self {
            Stores::Memory => Arc::new(InMemoryIdentityStore::new()),
            Stores::Postgres(pg) => Arc::new(pg.identity()),
        }
    }

    fn catalog(&self) -> Arc<dyn CatalogStore> {
        match self {
            Stores::Memory => Arc::new(InMemoryCatalogStore::new()),
            Stores::Postgres(pg) => Arc::new(pg.catalog()),
        }
    }

    fn basket(&self) -> Arc<dyn BasketStore> {
        match self {
            Stores::Memory => Arc::new(InMemoryBasketStore::new()),
            Stores::Postgres(pg) => Arc::new(pg.basket()),
        }
    }

    fn order(&self) -> Arc<dyn OrderStore> {
        match self {
            Stores::Memory => Arc::new(InMemoryOrderStore::new()),
            Stores::Postgres(pg) => Arc::new(pg.order()),
        }
    }
}

/// Connects to the broker, or logs events when it is disabled. A broker
/// that cannot be reached at startup is fatal.
async fn create_publisher(cfg: &AppConfig) -> anyhow::Result<Arc<dyn EventPublisher>> {
    if !cfg.events.enabled {
        tracing::info!("events disabled, published events are only logged");
        return Ok(Arc::new(LogPublisher));
    }
    let client_name = format!("emporium-{}", cfg.service.kind);
    let publisher = NatsPublisher::connect(&cfg.events, &client_name)
        .await
        .context("failed to connect to the message broker")?;
    Ok(Arc::new(publisher))
}

fn create_email_sender(cfg: &AppConfig) -> anyhow::Result<Arc<dyn EmailSender>> {
    if !cfg.smtp.enabled {
        tracing::info!("SMTP disabled, confirmation emails are only logged");
        return Ok(Arc::new(LogEmailSender));
    }
    let sender = SmtpEmailSender::new(&cfg.smtp.to_smtp_config())
        .context("invalid SMTP configuration")?;
    Ok(Arc::new(sender))
}

/// Routes of the configured service, health endpoints included.
pub async fn build_routes(cfg: &AppConfig) -> anyhow::Result<Router> {
    let kind = cfg.service.kind;
    if kind == ServiceKind::Events {
        anyhow::bail!("the events consumer does not serve HTTP");
    }

    let stores = Stores::connect(cfg).await?;
    let cache = CacheAside::new(create_cache_backend(&cfg.redis).await);
    cache.backend().start_sweeper(cfg.cache.sweep_interval());
    let ttls = cfg.cache.ttls();
    let events = EventEmitter::new(create_publisher(cfg).await?);

    let (routes, probe): (Router, Arc<dyn HealthProbe>) = match kind {
        ServiceKind::Identity => {
            let service = Arc::new(IdentityService::new(IdentityServiceDeps {
                store: stores.identity(),
                cache,
                ttls,
                code_ttl: cfg.cache.confirmation_code_ttl(),
                events,
                email: create_email_sender(cfg)?,
                templates: TemplateRenderer::with_defaults(),
                hasher: Arc::new(Argon2PasswordHasher),
                tokens: TokenIssuer::new(
                    &cfg.auth.token_secret,
                    std::time::Duration::from_secs(cfg.auth.token_ttl_secs),
                ),
            }));
            (
                api::identity::router(service.clone()),
                service as Arc<dyn HealthProbe>,
            )
        }
        ServiceKind::Catalog => {
            let service = Arc::new(CatalogService::new(stores.catalog(), cache, ttls, events));
            (
                api::catalog::router(service.clone()),
                service as Arc<dyn HealthProbe>,
            )
        }
        ServiceKind::Basket => {
            let service = Arc::new(BasketService::new(
                stores.basket(),
                cache,
                ttls.basket,
                events,
            ));
            (
                api::basket::router(service.clone()),
                service as Arc<dyn HealthProbe>,
            )
        }
        ServiceKind::Order => {
            let validator = HttpOwnerValidator::new(
                &cfg.identity_client.base_url,
                cfg.identity_client.timeout(),
            )
            .context("failed to build the identity service client")?;
            let service = Arc::new(OrderService::new(
                stores.order(),
                cache,
                ttls,
                events,
                Arc::new(validator),
            ));
            (
                api::order::router(service.clone()),
                service as Arc<dyn HealthProbe>,
            )
        }
        ServiceKind::Events => anyhow::bail!("the events consumer does not serve HTTP"),
    };

    tracing::info!(service = %kind, "service initialized");
    Ok(routes.merge(api::health::router(kind.as_str(), probe)))
}
