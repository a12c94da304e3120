//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::store::{KvStore, MemoryStore, SqliteStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Dependency targets that drown out our own logs at debug level.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rusqlite"];

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress dependency logs unless explicitly named
        for target in NOISY_TARGETS {
            if !filter.contains(target) {
                filter.push_str(&format!(",{}=warn", target));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    if config.logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Opens the key/value store selected by `storage.backend`.
pub fn init_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    match config.storage.backend.as_str() {
        "memory" => {
            info!("Using in-memory store; results will not survive a restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
        "sqlite" => {
            info!("Using SQLite store at {}", config.storage.sqlite_path);
            let store = SqliteStore::open(&config.storage.sqlite_path)
                .with_context(|| format!("Failed to open {}", config.storage.sqlite_path))?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("Unknown storage backend '{}'", other),
    }
}
