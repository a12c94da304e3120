//! Key/value persistence for cached results and blocklist bookkeeping.
//!
//! Values are opaque JSON documents stored under string keys. Each cache
//! partition lives under a single key as one aggregate map, so writers must
//! serialize their read-modify-write cycles (see [`crate::cache`]).

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, keys: &[&str]) -> Result<()>;
}

/// Milliseconds since the Unix epoch; clamps to zero if the clock is behind it.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
