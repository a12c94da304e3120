//! The verification service: one owned instance per process wiring the
//! cache, threat database, prober, classifier and scanner together.

use crate::cache::ResultCache;
use crate::config::Config;
use crate::engine::{RefreshOutcome, ThreatDatabase};
use crate::events::{Event, EventBus};
use crate::probe::{HttpProbe, ReachabilityProber, ReqwestProbe};
use crate::safety::{ReputationApis, SafetyClassifier};
use crate::scan::{BookmarkSource, ScanAck, ScanOrchestrator, ScanStatus};
use crate::stats::{StatsCollector, StatsSnapshot};
use crate::store::KvStore;
use crate::types::{LinkStatus, SafetyResult, SafetyStatus};
use crate::validate::validate_url;
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Single-URL checks with boundary validation.
pub struct Verifier {
    prober: ReachabilityProber,
    classifier: SafetyClassifier,
}

impl Verifier {
    pub fn new(prober: ReachabilityProber, classifier: SafetyClassifier) -> Self {
        Self { prober, classifier }
    }

    pub async fn check_link_status(&self, url: &str, bypass_cache: bool) -> LinkStatus {
        let url = url.trim();
        if let Err(e) = validate_url(url) {
            warn!("Rejected URL {:?}: {}", url, e);
            return LinkStatus::Dead;
        }
        self.prober.check(url, bypass_cache).await
    }

    pub async fn check_url_safety(&self, url: &str, bypass_cache: bool) -> SafetyResult {
        let url = url.trim();
        if let Err(e) = validate_url(url) {
            warn!("Rejected URL {:?}: {}", url, e);
            return SafetyResult::new(SafetyStatus::Unsafe, vec!["Invalid URL".into()]);
        }
        self.classifier.check(url, bypass_cache).await
    }
}

pub struct Service {
    config: Config,
    events: EventBus,
    stats: Arc<StatsCollector>,
    db: Arc<ThreatDatabase>,
    verifier: Arc<Verifier>,
    scanner: Arc<ScanOrchestrator>,
}

impl Service {
    /// Builds the service on a fresh reqwest client.
    pub fn from_config(
        config: Config,
        store: Arc<dyn KvStore>,
        bookmarks: Arc<dyn BookmarkSource>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let probe: Arc<dyn HttpProbe> =
            Arc::new(ReqwestProbe::new(client.clone(), config.probe.user_agent.clone()));
        Ok(Self::new(config, store, bookmarks, client, probe))
    }

    /// `client` serves feeds and reputation services, `probe` the link
    /// and redirect checks.
    pub fn new(
        config: Config,
        store: Arc<dyn KvStore>,
        bookmarks: Arc<dyn BookmarkSource>,
        client: Client,
        probe: Arc<dyn HttpProbe>,
    ) -> Self {
        let events = EventBus::default();
        let stats = StatsCollector::new(config.blocklist_names());
        let cache = Arc::new(ResultCache::new(
            store.clone(),
            Duration::from_secs(config.cache.ttl_days * 24 * 3600),
        ));
        let db = Arc::new(ThreatDatabase::new(
            &config.blocklists,
            client.clone(),
            store,
            events.clone(),
        ));

        let reputation = ReputationApis::from_config(&config.reputation, &client);
        if reputation.is_empty() {
            info!("No reputation API keys configured");
        } else {
            let names: Vec<_> = reputation.iter().map(|api| api.name()).collect();
            info!("Reputation services enabled: {}", names.join(", "));
        }

        let prober = ReachabilityProber::new(&config.probe, probe.clone(), cache.clone(), stats.clone());
        let classifier = SafetyClassifier::new(
            db.clone(),
            cache.clone(),
            reputation,
            probe,
            Duration::from_millis(config.probe.redirect_check_timeout_ms),
            stats.clone(),
        );
        let verifier = Arc::new(Verifier::new(prober, classifier));

        let scanner = Arc::new(ScanOrchestrator::new(
            config.scan.clone(),
            verifier.clone(),
            db.clone(),
            cache,
            bookmarks,
            events.clone(),
        ));

        Self {
            config,
            events,
            stats,
            db,
            verifier,
            scanner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    pub fn database(&self) -> &Arc<ThreatDatabase> {
        &self.db
    }

    pub async fn check_link_status(&self, url: &str, bypass_cache: bool) -> LinkStatus {
        self.verifier.check_link_status(url, bypass_cache).await
    }

    pub async fn check_url_safety(&self, url: &str, bypass_cache: bool) -> SafetyResult {
        self.verifier.check_url_safety(url, bypass_cache).await
    }

    pub async fn start_scan(&self) -> ScanAck {
        self.scanner.start().await
    }

    pub fn stop_scan(&self) -> ScanAck {
        self.scanner.cancel()
    }

    pub fn scan_status(&self) -> ScanStatus {
        self.scanner.status()
    }

    pub fn is_blocklist_loading(&self) -> bool {
        self.db.is_loading()
    }

    pub async fn wait_for_blocklist(&self) -> bool {
        self.db.wait_until_idle().await
    }

    /// Refreshes if needed and waits; returns readiness and index size.
    pub async fn ensure_blocklist_ready(&self) -> (bool, usize) {
        let ready = self.db.ensure_ready().await;
        (ready, self.db.len())
    }

    pub async fn refresh_blocklist(&self) -> RefreshOutcome {
        self.db.refresh().await
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}
