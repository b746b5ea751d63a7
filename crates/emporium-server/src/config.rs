use emporium_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Shared cache. Without it every instance caches locally.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache entry lifetimes
    #[serde(default)]
    pub cache: CacheConfig,
    /// Message broker
    #[serde(default)]
    pub events: EventsConfig,
    /// Identity service lookups made by the order service
    #[serde(default)]
    pub identity_client: IdentityClientConfig,
    #[serde(default)]
    pub smtp: SmtpSettings,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            if self.storage.postgres.url.is_empty() {
                return Err("storage.postgres.url must be set for the postgres backend".into());
            }
            if self.storage.postgres.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        if self.redis.enabled && self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        // Cache TTLs
        let ttls = [
            ("cache.entity_ttl_secs", self.cache.entity_ttl_secs),
            ("cache.list_ttl_secs", self.cache.list_ttl_secs),
            ("cache.basket_ttl_secs", self.cache.basket_ttl_secs),
            (
                "cache.confirmation_code_ttl_secs",
                self.cache.confirmation_code_ttl_secs,
            ),
        ];
        if let Some((name, _)) = ttls.iter().find(|(_, secs)| *secs == 0) {
            return Err(format!("{name} must be > 0"));
        }
        // Events
        if self.events.enabled && self.events.url.is_empty() {
            return Err("events.enabled=true requires events.url".into());
        }
        if self.service.kind == ServiceKind::Events && !self.events.enabled {
            return Err("the events consumer requires events.enabled=true".into());
        }
        if self.service.kind == ServiceKind::Events && self.events.consumer_topics.is_empty() {
            return Err("events.consumer_topics must not be empty for the events consumer".into());
        }
        // Per-service requirements
        if self.service.kind == ServiceKind::Order && self.identity_client.base_url.is_empty() {
            return Err("identity_client.base_url must be set for the order service".into());
        }
        if self.identity_client.timeout_ms == 0 {
            return Err("identity_client.timeout_ms must be > 0".into());
        }
        if self.service.kind == ServiceKind::Identity {
            if self.auth.token_secret.len() < 16 {
                return Err("auth.token_secret must be at least 16 bytes".into());
            }
            if self.auth.token_ttl_secs == 0 {
                return Err("auth.token_ttl_secs must be > 0".into());
            }
            if self.smtp.enabled && (self.smtp.host.is_empty() || self.smtp.from.is_empty()) {
                return Err("smtp.enabled=true requires smtp.host and smtp.from".into());
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    #[default]
    Identity,
    Catalog,
    Basket,
    Order,
    /// Subscribes to topics and logs what arrives.
    Events,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Identity => "identity",
            ServiceKind::Catalog => "catalog",
            ServiceKind::Basket => "basket",
            ServiceKind::Order => "order",
            ServiceKind::Events => "events",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" => Ok(ServiceKind::Identity),
            "catalog" => Ok(ServiceKind::Catalog),
            "basket" => Ok(ServiceKind::Basket),
            "order" => Ok(ServiceKind::Order),
            "events" => Ok(ServiceKind::Events),
            other => Err(format!(
                "unknown service '{other}', expected identity, catalog, basket, order or events"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub kind: ServiceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresConfig,
}

/// Redis configuration for the shared cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (falls back to a local cache without it)
    /// Default: false
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Cache entry lifetimes, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Single entities (`user:<id>`, `instrument:<id>`)
    #[serde(default = "default_entity_ttl")]
    pub entity_ttl_secs: u64,
    /// Collection views (`<kind>:all`, `<kind>:owner:<id>`)
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,
    #[serde(default = "default_basket_ttl")]
    pub basket_ttl_secs: u64,
    #[serde(default = "default_confirmation_code_ttl")]
    pub confirmation_code_ttl_secs: u64,
    /// How often expired entries are dropped from the local cache.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_entity_ttl() -> u64 {
    30 * 60
}
fn default_list_ttl() -> u64 {
    5 * 60
}
fn default_basket_ttl() -> u64 {
    10 * 60
}
fn default_confirmation_code_ttl() -> u64 {
    15 * 60
}
fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl_secs: default_entity_ttl(),
            list_ttl_secs: default_list_ttl(),
            basket_ttl_secs: default_basket_ttl(),
            confirmation_code_ttl_secs: default_confirmation_code_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> crate::cache::CacheTtls {
        crate::cache::CacheTtls {
            entity: Duration::from_secs(self.entity_ttl_secs),
            list: Duration::from_secs(self.list_ttl_secs),
            basket: Duration::from_secs(self.basket_ttl_secs),
        }
    }

    pub fn confirmation_code_ttl(&self) -> Duration {
        Duration::from_secs(self.confirmation_code_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// NATS JetStream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// When disabled, events are logged instead of published.
    #[serde(default = "default_events_enabled")]
    pub enabled: bool,
    #[serde(default = "default_nats_url")]
    pub url: String,
    /// Prefix of the per-topic stream names.
    #[serde(default = "default_stream_prefix")]
    pub stream_prefix: String,
    #[serde(default = "default_events_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Topics the events consumer subscribes to.
    #[serde(default = "default_consumer_topics")]
    pub consumer_topics: Vec<String>,
    /// Durable consumer name used by the events consumer.
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,
}

fn default_events_enabled() -> bool {
    true
}
fn default_nats_url() -> String {
    "nats://localhost:4222".into()
}
fn default_stream_prefix() -> String {
    "EMPORIUM".into()
}
fn default_events_connect_timeout() -> u64 {
    5
}
fn default_consumer_topics() -> Vec<String> {
    crate::events::ALL_TOPICS
        .iter()
        .map(|t| (*t).to_string())
        .collect()
}
fn default_consumer_name() -> String {
    "emporium-events".into()
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: default_events_enabled(),
            url: default_nats_url(),
            stream_prefix: default_stream_prefix(),
            connect_timeout_secs: default_events_connect_timeout(),
            consumer_topics: default_consumer_topics(),
            consumer_name: default_consumer_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClientConfig {
    /// Base URL of the identity service, e.g. `http://identity:8080`
    #[serde(default = "default_identity_base_url")]
    pub base_url: String,
    #[serde(default = "default_identity_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_identity_base_url() -> String {
    "http://localhost:8080".into()
}
fn default_identity_timeout_ms() -> u64 {
    3000
}

impl Default for IdentityClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_base_url(),
            timeout_ms: default_identity_timeout_ms(),
        }
    }
}

impl IdentityClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// SMTP delivery of confirmation emails. Disabled means emails are logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_smtp_port(),
            from: String::new(),
            username: None,
            password: None,
        }
    }
}

impl SmtpSettings {
    pub fn to_smtp_config(&self) -> emporium_notifications::SmtpConfig {
        emporium_notifications::SmtpConfig {
            host: self.host.clone(),
            port: self.port,
            from: self.from.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Login token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    #[serde(default)]
    pub token_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, ServiceKind};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads `path`, or `emporium.toml` if present when no path is given.
    /// An explicit path that does not exist is an error.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        load_config_for(path, None)
    }

    /// Like [`load_config`], with `service.kind` forced before validation.
    pub fn load_config_for(
        path: Option<&str>,
        kind: Option<ServiceKind>,
    ) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.is_file() {
                    return Err(format!("config file '{p}' not found"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("emporium.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., EMPORIUM__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("EMPORIUM")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        if let Some(kind) = kind {
            builder = builder
                .set_override("service.kind", kind.as_str())
                .map_err(|e| format!("config override error: {e}"))?;
        }
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
