use crate::types::{LinkStatus, SafetyStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

#[derive(Debug)]
pub struct StatsCollector {
    // Reachability outcomes
    live: AtomicU64,
    dead: AtomicU64,
    parked: AtomicU64,

    // Safety outcomes
    safe: AtomicU64,
    warning: AtomicU64,
    unsafe_: AtomicU64,
    unknown: AtomicU64,

    cache_hits: AtomicU64,

    // One slot per configured feed, same order as `blocklist_names`.
    hits_by_source: Vec<AtomicU64>,
    blocklist_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub links_checked: u64,
    pub live: u64,
    pub dead: u64,
    pub parked: u64,
    pub safety_checked: u64,
    pub safe: u64,
    pub warning: u64,
    #[serde(rename = "unsafe")]
    pub unsafe_: u64,
    pub unknown: u64,
    pub cache_hits: u64,
    pub blocklist_hits: BTreeMap<String, u64>,
}

impl StatsCollector {
    pub fn new(blocklist_names: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            live: AtomicU64::new(0),
            dead: AtomicU64::new(0),
            parked: AtomicU64::new(0),
            safe: AtomicU64::new(0),
            warning: AtomicU64::new(0),
            unsafe_: AtomicU64::new(0),
            unknown: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            hits_by_source: blocklist_names.iter().map(|_| AtomicU64::new(0)).collect(),
            blocklist_names,
        })
    }

    /// Spawns the periodic dump. Requires a running tokio runtime.
    pub fn start_reporting(self: &Arc<Self>, log_interval_sec: u64) {
        let stats = self.clone();
        let period = Duration::from_secs(log_interval_sec.max(1));
        tokio::spawn(async move {
            stats.run_logger(period).await;
        });
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_link(&self, status: LinkStatus) {
        let counter = match status {
            LinkStatus::Live => &self.live,
            LinkStatus::Dead => &self.dead,
            LinkStatus::Parked => &self.parked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_safety(&self, status: SafetyStatus) {
        let counter = match status {
            SafetyStatus::Safe => &self.safe,
            SafetyStatus::Warning => &self.warning,
            SafetyStatus::Unsafe => &self.unsafe_,
            SafetyStatus::Unknown => &self.unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a blocklist hit against every feed that listed the entry.
    /// Names outside the configured set are ignored.
    pub fn record_blocklist_hit(&self, sources: &[String]) {
        for source in sources {
            if let Some(idx) = self.blocklist_names.iter().position(|n| n == source) {
                self.hits_by_source[idx].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let live = self.live.load(Ordering::Relaxed);
        let dead = self.dead.load(Ordering::Relaxed);
        let parked = self.parked.load(Ordering::Relaxed);
        let safe = self.safe.load(Ordering::Relaxed);
        let warning = self.warning.load(Ordering::Relaxed);
        let unsafe_ = self.unsafe_.load(Ordering::Relaxed);
        let unknown = self.unknown.load(Ordering::Relaxed);

        let blocklist_hits = self
            .blocklist_names
            .iter()
            .zip(&self.hits_by_source)
            .map(|(name, count)| (name.clone(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        StatsSnapshot {
            links_checked: live + dead + parked,
            live,
            dead,
            parked,
            safety_checked: safe + warning + unsafe_ + unknown,
            safe,
            warning,
            unsafe_,
            unknown,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            blocklist_hits,
        }
    }

    async fn run_logger(&self, period: Duration) {
        let mut interval = time::interval(period);
        // First tick fires immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    fn dump_stats(&self) {
        let s = self.snapshot();

        let mut block_stats = String::new();
        let total_hits: u64 = s.blocklist_hits.values().sum();
        if total_hits > 0 {
            block_stats.push_str(" BlockStats: ");
            for (name, count) in &s.blocklist_hits {
                let pct = (*count as f64 / total_hits as f64) * 100.0;
                block_stats.push_str(&format!("[{}: {} ({:.1}%)] ", name, count, pct));
            }
        }

        info!(
            "STATS DUMP: Links: {} (live {}, dead {}, parked {}), Safety: {} (safe {}, warning {}, unsafe {}, unknown {}), CacheHits: {}{}",
            s.links_checked,
            s.live,
            s.dead,
            s.parked,
            s.safety_checked,
            s.safe,
            s.warning,
            s.unsafe_,
            s.unknown,
            s.cache_hits,
            block_stats
        );
    }
}
