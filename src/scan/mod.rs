//! Batched, cancellable sweep of every bookmark through both checks.

pub mod bookmarks;
pub mod state;

pub use bookmarks::{Bookmark, BookmarkNode, BookmarkSource, JsonBookmarkSource, MemoryBookmarkSource};
pub use state::{ScanState, ScanStatus};

use crate::cache::ResultCache;
use crate::config::ScanConfig;
use crate::engine::ThreatDatabase;
use crate::events::{Event, EventBus};
use crate::service::Verifier;
use crate::types::{LinkStatus, SafetyStatus};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of one bookmark. Statuses are absent for disabled check types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkScanResult {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_status: Option<LinkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_status: Option<SafetyStatus>,
    pub safety_sources: Vec<String>,
}

impl BookmarkScanResult {
    fn blank(bookmark: &Bookmark) -> Self {
        Self {
            id: bookmark.id.clone(),
            url: bookmark.url.clone(),
            title: bookmark.title.clone(),
            link_status: None,
            safety_status: None,
            safety_sources: Vec::new(),
        }
    }
}

/// Reply to start / stop requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScanAck {
    fn ok(total: Option<usize>) -> Self {
        Self {
            success: true,
            total,
            message: None,
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            total: None,
            message: Some(message.into()),
        }
    }
}

pub struct ScanOrchestrator {
    verifier: Arc<Verifier>,
    db: Arc<ThreatDatabase>,
    cache: Arc<ResultCache>,
    bookmarks: Arc<dyn BookmarkSource>,
    events: EventBus,
    config: ScanConfig,
    state: ScanState,
}

impl ScanOrchestrator {
    pub fn new(
        config: ScanConfig,
        verifier: Arc<Verifier>,
        db: Arc<ThreatDatabase>,
        cache: Arc<ResultCache>,
        bookmarks: Arc<dyn BookmarkSource>,
        events: EventBus,
    ) -> Self {
        Self {
            verifier,
            db,
            cache,
            bookmarks,
            events,
            config,
            state: ScanState::new(),
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.state.status()
    }

    pub fn cancel(&self) -> ScanAck {
        if self.state.cancel() {
            info!("Cancelling background scan...");
            ScanAck::ok(None)
        } else {
            ScanAck::rejected("No scan in progress")
        }
    }

    /// Prepares a scan and spawns its batch loop.
    ///
    /// Returns once the bookmark list is known; progress arrives as events.
    pub async fn start(self: &Arc<Self>) -> ScanAck {
        if !self.config.link_checking_enabled && !self.config.safety_checking_enabled {
            info!("Both check types disabled, not scanning");
            return ScanAck::rejected("Link and safety checking are both disabled");
        }
        let Some(claim) = self.state.claim() else {
            info!("Scan already in progress");
            return ScanAck::rejected("Scan already in progress");
        };

        self.cache.clear_all().await;

        if self.config.safety_checking_enabled {
            self.prepare_database().await;
        }

        let bookmarks = match self.bookmarks.bookmarks().await {
            Ok(bookmarks) => bookmarks,
            Err(e) => {
                error!("Error starting scan: {:#}", e);
                return ScanAck::rejected(format!("{:#}", e));
            }
        };

        let total = bookmarks.len();
        info!("Starting scan of {} bookmarks", total);
        self.state.set_total(total);
        self.events.emit(Event::ScanStarted { total });

        claim.hand_off();
        let this = self.clone();
        tokio::spawn(async move {
            this.run(bookmarks).await;
        });

        ScanAck::ok(Some(total))
    }

    async fn prepare_database(&self) {
        if self.db.needs_refresh() && !self.db.is_loading() {
            info!("Ensuring blocklist database is up to date before scanning");
            self.events.emit(Event::ScanStatus {
                message: "Loading security database...".into(),
            });
            self.db.refresh().await;
        }
        if self.db.is_loading() {
            info!("Waiting for blocklist database to finish loading");
            self.events.emit(Event::ScanStatus {
                message: "Waiting for security database to load...".into(),
            });
            self.db.wait_until_idle().await;
        }
    }

    async fn run(self: Arc<Self>, bookmarks: Vec<Bookmark>) {
        let total = bookmarks.len();
        let batch_size = self.config.batch_size.max(1);
        let delay = Duration::from_millis(self.config.batch_delay_ms);
        let mut seen = FxHashSet::default();
        let mut batches = bookmarks.chunks(batch_size).peekable();

        while let Some(batch) = batches.next() {
            if self.state.is_cancelled() {
                break;
            }

            let handles: Vec<_> = batch
                .iter()
                .filter(|bookmark| seen.insert(bookmark.id.clone()))
                .map(|bookmark| {
                    let this = self.clone();
                    let owned = bookmark.clone();
                    let handle = tokio::spawn(async move {
                        let result = this.scan_one(&owned).await;
                        this.report(result, total);
                    });
                    (bookmark, handle)
                })
                .collect();

            for (bookmark, handle) in handles {
                if let Err(e) = handle.await {
                    warn!("Error checking bookmark {}: {}", bookmark.id, e);
                    self.report(self.degraded(bookmark), total);
                }
            }

            if batches.peek().is_some() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let cancelled = self.state.is_cancelled();
        let scanned = self.state.status().scanned_count;
        self.state.finish();

        if cancelled {
            info!("Scan cancelled - scanned {}/{}", scanned, total);
            self.events.emit(Event::ScanCancelled { scanned, total });
        } else {
            info!("Scan complete - scanned {}/{}", scanned, total);
            self.events.emit(Event::ScanComplete { scanned, total });
        }
    }

    async fn scan_one(&self, bookmark: &Bookmark) -> BookmarkScanResult {
        let mut result = BookmarkScanResult::blank(bookmark);
        if self.config.link_checking_enabled {
            result.link_status = Some(self.verifier.check_link_status(&bookmark.url, true).await);
        }
        if self.config.safety_checking_enabled {
            let safety = self.verifier.check_url_safety(&bookmark.url, true).await;
            result.safety_status = Some(safety.status);
            result.safety_sources = safety.sources;
        }
        result
    }

    fn degraded(&self, bookmark: &Bookmark) -> BookmarkScanResult {
        let mut result = BookmarkScanResult::blank(bookmark);
        if self.config.link_checking_enabled {
            result.link_status = Some(LinkStatus::Dead);
        }
        if self.config.safety_checking_enabled {
            result.safety_status = Some(SafetyStatus::Unknown);
        }
        result
    }

    fn report(&self, result: BookmarkScanResult, total: usize) {
        let scanned = self.state.record_scanned();
        self.events.emit(Event::ScanProgress {
            scanned,
            total,
            result,
        });
    }
}
