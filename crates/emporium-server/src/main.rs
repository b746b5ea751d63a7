use std::env;

use emporium_server::ServerBuilder;
use emporium_server::config::{ServiceKind, loader::load_config_for};
use emporium_server::events::run_consumer;
use emporium_server::server::shutdown_signal;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From EMPORIUM_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (emporium.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (EMPORIUM_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    emporium_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    // --service overrides service.kind
    let kind = match service_override().map(|k| k.parse::<ServiceKind>()).transpose() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let cfg = match load_config_for(config_path.as_deref(), kind) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = config_path.as_deref().unwrap_or("emporium.toml"),
        source = %source,
        service = %cfg.service.kind,
        "Configuration loaded"
    );

    emporium_server::observability::apply_logging_level(&cfg.logging.level);

    if cfg.service.kind == ServiceKind::Events {
        if let Err(e) = run_consumer(&cfg.events, shutdown_signal()).await {
            tracing::error!(error = %e, "events consumer failed");
            std::process::exit(2);
        }
        return;
    }

    let routes = match emporium_server::bootstrap::build_routes(&cfg).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "service initialization failed");
            eprintln!("Service initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    let server = ServerBuilder::new()
        .with_config(cfg)
        .with_routes(routes)
        .build();

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: EMPORIUM_CONFIG
/// 3. Default: emporium.toml, if it exists
///
/// An explicit path must exist; the default may be absent.
fn resolve_config_path() -> (Option<String>, ConfigSource) {
    if let Some(path) = flag_value("--config") {
        return (Some(path), ConfigSource::CliArgument);
    }

    if let Ok(path) = env::var("EMPORIUM_CONFIG") {
        if !path.is_empty() {
            return (Some(path), ConfigSource::EnvironmentVariable);
        }
    }

    (None, ConfigSource::Default)
}

fn service_override() -> Option<String> {
    flag_value("--service")
}

fn flag_value(flag: &str) -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}
