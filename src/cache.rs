//! Result cache with two independent partitions.
//!
//! Each partition is persisted as one aggregate `url -> {result, timestamp}`
//! map under a single store key. Writes to a partition hold that partition's
//! async mutex for the whole read-modify-write so concurrent writers cannot
//! drop each other's entries. Store failures are logged and degrade to a
//! miss or a skipped write.

use crate::store::{epoch_millis, KvStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    LinkStatus,
    Safety,
}

impl Partition {
    pub fn store_key(&self) -> &'static str {
        match self {
            Partition::LinkStatus => "linkStatusCache",
            Partition::Safety => "safetyStatusCache",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    result: Value,
    timestamp: u64,
}

pub struct ResultCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    link_guard: Mutex<()>,
    safety_guard: Mutex<()>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            link_guard: Mutex::new(()),
            safety_guard: Mutex::new(()),
        }
    }

    fn guard(&self, partition: Partition) -> &Mutex<()> {
        match partition {
            Partition::LinkStatus => &self.link_guard,
            Partition::Safety => &self.safety_guard,
        }
    }

    /// Returns the cached result for `key`, if present and younger than the TTL.
    pub async fn get<T: DeserializeOwned>(&self, partition: Partition, key: &str) -> Option<T> {
        let aggregate = match self.store.get(partition.store_key()).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read error for {}: {:#}", partition.store_key(), e);
                return None;
            }
        };

        let raw = aggregate.get(key)?.clone();
        let entry: CacheEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Ignoring malformed cache entry for {}: {}", key, e);
                return None;
            }
        };

        let age = epoch_millis().saturating_sub(entry.timestamp);
        if age >= self.ttl.as_millis() as u64 {
            return None;
        }

        serde_json::from_value(entry.result).ok()
    }

    /// Stores `result` for `key`, stamped with the current time.
    pub async fn set<T: Serialize>(&self, partition: Partition, key: &str, result: &T) {
        let result = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache write error for {}: {}", key, e);
                return;
            }
        };

        let _held = self.guard(partition).lock().await;

        let mut aggregate = match self.store.get(partition.store_key()).await {
            Ok(Some(Value::Object(map))) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                warn!("Cache write error for {}: {:#}", partition.store_key(), e);
                return;
            }
        };

        let entry = CacheEntry {
            result,
            timestamp: epoch_millis(),
        };
        match serde_json::to_value(entry) {
            Ok(value) => {
                aggregate.insert(key.to_string(), value);
            }
            Err(e) => {
                warn!("Cache write error for {}: {}", key, e);
                return;
            }
        }

        if let Err(e) = self
            .store
            .set(partition.store_key(), Value::Object(aggregate))
            .await
        {
            warn!("Cache write error for {}: {:#}", partition.store_key(), e);
        }
    }

    /// Drops both partitions.
    pub async fn clear_all(&self) {
        let _link = self.link_guard.lock().await;
        let _safety = self.safety_guard.lock().await;
        let keys = [
            Partition::LinkStatus.store_key(),
            Partition::Safety.store_key(),
        ];
        if let Err(e) = self.store.remove(&keys).await {
            warn!("Cache clear error: {:#}", e);
        }
    }
}
