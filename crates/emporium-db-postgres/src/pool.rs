use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

#[tracing::instrument(skip(config), fields(url = %redact_url(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    if config.pool_size == 0 {
        return Err(PostgresError::config("pool_size must be > 0"));
    }

    let min_connections = config.effective_min_connections();
    tracing::info!(
        pool_size = config.pool_size,
        min_connections,
        "connecting to PostgreSQL"
    );

    let mut options = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs));
    if let Some(idle) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle));
    }

    Ok(options.connect(&config.url).await?)
}

/// Replaces the password of a connection URL for logging.
pub(crate) fn redact_url(url: &str) -> String {
    let Some((head, host)) = url.rsplit_once('@') else {
        return url.to_string();
    };
    let user_start = head.find("://").map_or(0, |p| p + 3);
    match head[user_start..].split_once(':') {
        Some((user, _)) => format!("{}{user}:****@{host}", &head[..user_start]),
        None => url.to_string(),
    }
}
