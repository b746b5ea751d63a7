//! Log setup for every service binary and the events consumer.
//!
//! Logs go to stdout through `tracing_subscriber::fmt`. The filter starts at
//! `RUST_LOG` (or `info`) before the config is read, and is swapped for
//! `logging.level` once it is. Request spans carry the `x-request-id` set by
//! the HTTP layer.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Installs the global subscriber. Later calls are no-ops.
fn init_tracing_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches to the configured `logging.level` (an `EnvFilter` directive such
/// as `info` or `emporium_server=debug,sqlx=warn`).
///
/// `RUST_LOG` wins over the config file. An invalid directive keeps the
/// current filter.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::warn!(error = %e, "failed to apply logging.level");
            }
        }
        Err(e) => tracing::warn!(level, error = %e, "ignoring invalid logging.level"),
    }
}
