//! Safety classifier: threat database, reputation services and local
//! heuristics folded into one escalating verdict.

pub mod heuristics;
pub mod reputation;

pub use reputation::{ReputationApi, ReputationApis, ThreatMatchApi, ThreatMatchFlavor, VirusTotalApi};

use crate::cache::{Partition, ResultCache};
use crate::engine::{RefreshOutcome, ThreatDatabase};
use crate::probe::HttpProbe;
use crate::stats::StatsCollector;
use crate::types::{SafetyResult, SafetyStatus, Verdict};
use crate::validate::{matches_domain_list, privileged_kind, LookupKey};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Platforms whose local blocklist hits are ignored. Reputation services and
/// heuristics still apply.
pub const TRUSTED_DOMAINS: &[&str] = &[
    "archive.org",
    "github.io",
    "githubusercontent.com",
    "github.com",
    "gitlab.com",
    "gitlab.io",
    "docs.google.com",
    "sites.google.com",
    "drive.google.com",
];

pub fn is_trusted_domain(hostname: &str) -> bool {
    matches_domain_list(hostname, TRUSTED_DOMAINS)
}

/// Older records stored only the status string.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSafety {
    Full(SafetyResult),
    Legacy(SafetyStatus),
}

impl From<StoredSafety> for SafetyResult {
    fn from(stored: StoredSafety) -> Self {
        match stored {
            StoredSafety::Full(result) => result,
            StoredSafety::Legacy(status) => SafetyResult::new(status, Vec::new()),
        }
    }
}

pub struct SafetyClassifier {
    db: Arc<ThreatDatabase>,
    cache: Arc<ResultCache>,
    reputation: ReputationApis,
    http: Arc<dyn HttpProbe>,
    redirect_timeout: Duration,
    stats: Arc<StatsCollector>,
}

impl SafetyClassifier {
    pub fn new(
        db: Arc<ThreatDatabase>,
        cache: Arc<ResultCache>,
        reputation: ReputationApis,
        http: Arc<dyn HttpProbe>,
        redirect_timeout: Duration,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            db,
            cache,
            reputation,
            http,
            redirect_timeout,
            stats,
        }
    }

    pub async fn check(&self, url: &str, bypass_cache: bool) -> SafetyResult {
        if let Some(kind) = privileged_kind(url) {
            debug!("Privileged URL detected ({}): {}", kind.label(), url);
            let result = SafetyResult::new(
                SafetyStatus::Safe,
                vec![format!("{} (not scanned)", kind.label())],
            );
            return self.finish(url, result).await;
        }

        if bypass_cache {
            debug!("Bypassing safety cache for {}", url);
        } else if let Some(cached) = self.cache.get::<StoredSafety>(Partition::Safety, url).await {
            let cached = SafetyResult::from(cached);
            debug!("Using cached safety status for {}: {}", url, cached.status);
            self.stats.inc_cache_hit();
            return cached;
        }

        // Not cached, so a post-refresh check is not stuck on this answer.
        if self.db.is_loading() {
            info!("Blocklist database still loading, returning unknown for {}", url);
            self.stats.record_safety(SafetyStatus::Unknown);
            return SafetyResult::unknown();
        }

        if self.db.needs_refresh() {
            info!("Blocklist database is stale or empty, refreshing");
            if self.db.refresh().await == RefreshOutcome::AlreadyRunning
                && !self.db.wait_until_idle().await
            {
                self.stats.record_safety(SafetyStatus::Unknown);
                return SafetyResult::unknown();
            }
        }

        let key = LookupKey::from_url(url);

        if is_trusted_domain(&key.hostname) {
            info!(
                "{} is on the trusted allow-list, skipping local blocklist lookup",
                key.hostname
            );
        } else if let Some(hit) = self.db.check(&key) {
            info!(
                "{} found in blocklist database ({:?}), detected by: {}",
                url,
                hit.kind,
                hit.sources.join(", ")
            );
            self.stats.record_blocklist_hit(&hit.sources);
            let result = SafetyResult::new(SafetyStatus::Unsafe, hit.sources);
            return self.finish(url, result).await;
        }

        let mut verdict = Verdict::new();

        for api in self.reputation.iter() {
            let status = api.check(url).await;
            if matches!(status, SafetyStatus::Warning | SafetyStatus::Unsafe) {
                info!("{} flagged {} as {}", api.name(), url, status);
            }
            verdict.escalate(status, api.name());
        }

        let patterns =
            heuristics::suspicious_patterns(url, &key, self.http.as_ref(), self.redirect_timeout)
                .await;
        if !patterns.is_empty() {
            info!("Suspicious patterns for {}: {}", url, patterns.join(", "));
        }
        for label in patterns {
            verdict.escalate(SafetyStatus::Warning, label);
        }

        let result = verdict.finish();
        info!("Safety verdict for {}: {}", url, result.status);
        self.finish(url, result).await
    }

    async fn finish(&self, url: &str, result: SafetyResult) -> SafetyResult {
        self.cache.set(Partition::Safety, url, &result).await;
        self.stats.record_safety(result.status);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlocklistConfig;
    use crate::events::EventBus;
    use crate::probe::{ProbeError, ProbeRequest, ProbeResponse};
    use crate::store::{KvStore, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Offline;

    #[async_trait]
    impl HttpProbe for Offline {
        async fn probe(&self, _request: ProbeRequest<'_>) -> Result<ProbeResponse, ProbeError> {
            Err(ProbeError::Unreachable("offline".into()))
        }
    }

    struct FixedApi {
        name: &'static str,
        status: SafetyStatus,
        calls: AtomicUsize,
    }

    impl FixedApi {
        fn new(name: &'static str, status: SafetyStatus) -> Arc<Self> {
            Arc::new(Self {
                name,
                status,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReputationApi for FixedApi {
        fn name(&self) -> &str {
            self.name
        }
        async fn check(&self, _url: &str) -> SafetyStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.status
        }
    }

    fn classifier(store: Arc<MemoryStore>, apis: Vec<Arc<dyn ReputationApi>>) -> SafetyClassifier {
        // No feeds: a refresh completes instantly with an empty index.
        let config = BlocklistConfig {
            sources: Vec::new(),
            ..BlocklistConfig::default()
        };
        let db = Arc::new(ThreatDatabase::new(
            &config,
            reqwest::Client::new(),
            store.clone(),
            EventBus::default(),
        ));
        let cache = Arc::new(ResultCache::new(store, Duration::from_secs(3600)));
        SafetyClassifier::new(
            db,
            cache,
            ReputationApis::new(apis),
            Arc::new(Offline),
            Duration::from_secs(1),
            StatsCollector::new(vec![]),
        )
    }

    #[tokio::test]
    async fn test_clean_site_is_safe_without_sources() {
        let c = classifier(Arc::new(MemoryStore::new()), vec![]);
        let result = c.check("https://example.com", false).await;
        assert_eq!(result, SafetyResult::new(SafetyStatus::Safe, vec![]));
    }

    #[tokio::test]
    async fn test_privileged_pages_are_not_scanned() {
        let c = classifier(Arc::new(MemoryStore::new()), vec![]);
        let result = c.check("chrome-extension://abcdef/options.html", false).await;
        assert_eq!(result.status, SafetyStatus::Safe);
        assert_eq!(result.sources, vec!["Extension page (not scanned)"]);
    }

    #[tokio::test]
    async fn test_all_apis_consulted_and_attributed() {
        let google = FixedApi::new("Google Safe Browsing", SafetyStatus::Unsafe);
        let yandex = FixedApi::new("Yandex Safe Browsing", SafetyStatus::Safe);
        let vt = FixedApi::new("VirusTotal", SafetyStatus::Warning);
        let c = classifier(
            Arc::new(MemoryStore::new()),
            vec![
                google.clone() as Arc<dyn ReputationApi>,
                yandex.clone(),
                vt.clone(),
            ],
        );

        let result = c.check("https://bit.ly/abc", false).await;
        assert_eq!(result.status, SafetyStatus::Unsafe);
        assert_eq!(
            result.sources,
            vec!["Google Safe Browsing", "VirusTotal", "URL Shortener"]
        );
        for api in [&google, &yandex, &vt] {
            assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_unknown_api_answers_do_not_escalate() {
        let api = FixedApi::new("VirusTotal", SafetyStatus::Unknown);
        let c = classifier(Arc::new(MemoryStore::new()), vec![api as Arc<dyn ReputationApi>]);
        let result = c.check("https://example.org/page", false).await;
        assert_eq!(result, SafetyResult::new(SafetyStatus::Safe, vec![]));
    }

    #[tokio::test]
    async fn test_results_are_cached_until_bypassed() {
        let api = FixedApi::new("VirusTotal", SafetyStatus::Warning);
        let c = classifier(
            Arc::new(MemoryStore::new()),
            vec![api.clone() as Arc<dyn ReputationApi>],
        );

        let first = c.check("https://example.net", false).await;
        let second = c.check("https://example.net", false).await;
        assert_eq!(first, second);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        c.check("https://example.net", true).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_legacy_cache_records_are_read() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "safetyStatusCache",
                json!({
                    "https://old.test": {
                        "result": "warning",
                        "timestamp": crate::store::epoch_millis(),
                    }
                }),
            )
            .await
            .unwrap();

        let c = classifier(store, vec![]);
        let result = c.check("https://old.test", false).await;
        assert_eq!(result, SafetyResult::new(SafetyStatus::Warning, vec![]));
    }

    #[test]
    fn test_trusted_domains() {
        assert!(is_trusted_domain("github.com"));
        assert!(is_trusted_domain("raw.githubusercontent.com"));
        assert!(is_trusted_domain("web.archive.org"));
        assert!(!is_trusted_domain("google.com"));
        assert!(!is_trusted_domain("evilgithub.com"));
    }
}
