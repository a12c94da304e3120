use super::matcher::{HashedMatcher, MatcherBuilder};
use super::state::RefreshState;
use super::traits::{BlocklistMatcher, ThreatMatch};
use crate::config::{BlocklistConfig, FeedSource};
use crate::events::{BlocklistPhase, Event, EventBus};
use crate::store::{epoch_millis, KvStore};
use crate::validate::LookupKey;
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};

pub const LAST_UPDATE_KEY: &str = "blocklistLastUpdate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Distinct entries in the rebuilt index.
    pub domains: usize,
    /// Entries parsed across all feeds, duplicates included.
    pub total_entries: usize,
    pub sources: usize,
    pub failed_sources: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(RefreshSummary),
    /// Another refresh was in flight; nothing was fetched.
    AlreadyRunning,
}

/// Aggregated threat database built from the configured blocklist feeds.
pub struct ThreatDatabase {
    sources: Vec<FeedSource>,
    client: Client,
    download_timeout: Duration,
    refresh_interval: Duration,
    wait_timeout: Duration,
    index: ArcSwap<HashedMatcher>,
    state: RefreshState,
    store: Arc<dyn KvStore>,
    events: EventBus,
}

impl ThreatDatabase {
    pub fn new(
        config: &BlocklistConfig,
        client: Client,
        store: Arc<dyn KvStore>,
        events: EventBus,
    ) -> Self {
        Self {
            sources: config.sources.clone(),
            client,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_hours * 3600),
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
            index: ArcSwap::from_pointee(HashedMatcher::default()),
            state: RefreshState::new(),
            store,
            events,
        }
    }

    pub fn check(&self, key: &LookupKey) -> Option<ThreatMatch> {
        self.index.load().check(key)
    }

    pub fn len(&self) -> usize {
        self.index.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn last_update(&self) -> Option<u64> {
        self.state.last_update()
    }

    /// True when the index is empty, was never built, or is older than the
    /// refresh interval.
    pub fn needs_refresh(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        match self.state.last_update() {
            None => true,
            Some(at) => {
                epoch_millis().saturating_sub(at) > self.refresh_interval.as_millis() as u64
            }
        }
    }

    /// Waits for an in-flight refresh, bounded by the configured wait timeout.
    pub async fn wait_until_idle(&self) -> bool {
        let idle = self.state.wait_idle(self.wait_timeout).await;
        if !idle {
            warn!(
                "Blocklist refresh still running after {:?}, giving up the wait",
                self.wait_timeout
            );
        }
        idle
    }

    /// Refreshes if stale or empty, then waits for any refresh to settle.
    pub async fn ensure_ready(&self) -> bool {
        if self.needs_refresh() && !self.is_loading() {
            info!("Ensuring blocklist database is up to date...");
            self.refresh().await;
        }
        self.wait_until_idle().await
    }

    /// Rebuilds the index from every feed, one feed at a time.
    ///
    /// A call made while another refresh is running returns
    /// [`RefreshOutcome::AlreadyRunning`] immediately.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_loading) = self.state.try_begin() else {
            info!("Blocklist refresh already in progress, skipping duplicate request");
            return RefreshOutcome::AlreadyRunning;
        };

        let total = self.sources.len();
        info!("Refreshing blocklists from {} sources...", total);
        self.index.store(Arc::new(HashedMatcher::default()));
        self.events.emit(Event::BlocklistProgress {
            current: 0,
            total,
            source_name: None,
            status: BlocklistPhase::Starting,
        });

        let mut builder = HashedMatcher::builder();
        let mut failed_sources = 0;

        for (idx, source) in self.sources.iter().enumerate() {
            self.events.emit(Event::BlocklistProgress {
                current: idx + 1,
                total,
                source_name: Some(source.name.clone()),
                status: BlocklistPhase::Downloading,
            });

            if let Err(e) = self.fetch_into(source, &mut builder).await {
                error!("Blocklist '{}' failed: {:#}", source.name, e);
                failed_sources += 1;
            }
        }

        let total_entries = builder.raw_count();
        let matcher = builder.build();
        let domains = matcher.len();
        self.index.store(Arc::new(matcher));

        let now = epoch_millis();
        self.state.mark_updated(now);
        if let Err(e) = self.store.set(LAST_UPDATE_KEY, json!(now)).await {
            warn!("Failed to persist blocklist update time: {:#}", e);
        }

        info!(
            "Blocklist refresh complete. Total distinct entries: {} (from {} raw entries, {} of {} sources failed)",
            domains, total_entries, failed_sources, total
        );
        self.events.emit(Event::BlocklistComplete {
            domains,
            total_entries,
            sources: total,
        });

        RefreshOutcome::Completed(RefreshSummary {
            domains,
            total_entries,
            sources: total,
            failed_sources,
        })
    }

    async fn fetch_into(&self, source: &FeedSource, builder: &mut MatcherBuilder) -> Result<()> {
        let entries = tokio::time::timeout(self.download_timeout, self.fetch_and_parse(source))
            .await
            .with_context(|| format!("timed out after {:?}", self.download_timeout))??;

        info!("Parsed {} entries from '{}'", entries.len(), source.name);
        let name: Arc<str> = Arc::from(source.name.as_str());
        for entry in &entries {
            builder.insert(entry, &name);
        }
        Ok(())
    }

    async fn fetch_and_parse(&self, source: &FeedSource) -> Result<Vec<String>> {
        info!("Fetching blocklist '{}' from {}", source.name, source.url);
        let resp = self
            .client
            .get(&source.url)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("bad status")?;

        let stream = resp
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let reader = StreamReader::new(stream);
        let mut lines = BufReader::new(reader).split(b'\n');
        let mut entries = Vec::new();

        // Stray non-UTF-8 bytes only spoil their own line.
        while let Some(line) = lines.next_segment().await.context("read failed")? {
            if let Some(entry) = source.format.parse_line(&String::from_utf8_lossy(&line)) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
