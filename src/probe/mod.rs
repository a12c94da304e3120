//! Reachability prober: live / dead / parked for a single URL.
//!
//! Order of evaluation: privileged scheme, cache, parking-provider host,
//! HEAD probe (with content sniffing on success), then a GET fallback for
//! ambiguous outcomes. Every terminal result is cached under the URL as
//! given, whether or not the cache read was bypassed.

pub mod http;
pub mod parking;

pub use http::{HttpProbe, ProbeError, ProbeMethod, ProbeRequest, ProbeResponse, ReqwestProbe};
pub use parking::ContentThresholds;

use crate::cache::{Partition, ResultCache};
use crate::config::ProbeConfig;
use crate::stats::StatsCollector;
use crate::types::LinkStatus;
use crate::validate::{host_of, privileged_kind};
use parking::{classify_content, is_parking_exempt, is_parking_host};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Statuses that usually mean a bot wall rather than a missing resource.
const BLOCKING_STATUSES: &[u16] = &[401, 403, 405, 406, 429];

#[derive(Debug, Clone, Copy)]
pub struct ProbeTimeouts {
    pub head: Duration,
    pub content: Duration,
    pub fallback: Duration,
}

impl From<&ProbeConfig> for ProbeTimeouts {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            head: Duration::from_millis(config.head_timeout_ms),
            content: Duration::from_millis(config.content_timeout_ms),
            fallback: Duration::from_millis(config.fallback_timeout_ms),
        }
    }
}

pub struct ReachabilityProber {
    http: Arc<dyn HttpProbe>,
    cache: Arc<ResultCache>,
    stats: Arc<StatsCollector>,
    timeouts: ProbeTimeouts,
    thresholds: ContentThresholds,
}

impl ReachabilityProber {
    pub fn new(
        config: &ProbeConfig,
        http: Arc<dyn HttpProbe>,
        cache: Arc<ResultCache>,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            http,
            cache,
            stats,
            timeouts: ProbeTimeouts::from(config),
            thresholds: ContentThresholds {
                substantial_bytes: config.substantial_content_bytes,
                weak_matches: config.weak_indicator_threshold,
            },
        }
    }

    pub async fn check(&self, url: &str, bypass_cache: bool) -> LinkStatus {
        if let Some(kind) = privileged_kind(url) {
            debug!("Privileged URL detected ({}): {}", kind.label(), url);
            return self.finish(url, LinkStatus::Live).await;
        }

        if bypass_cache {
            debug!("Bypassing link cache for {}", url);
        } else if let Some(cached) = self.cache.get::<LinkStatus>(Partition::LinkStatus, url).await {
            debug!("Using cached link status for {}: {}", url, cached);
            self.stats.inc_cache_hit();
            return cached;
        }

        let status = self.classify(url).await;
        self.finish(url, status).await
    }

    async fn finish(&self, url: &str, status: LinkStatus) -> LinkStatus {
        self.cache.set(Partition::LinkStatus, url, &status).await;
        self.stats.record_link(status);
        status
    }

    async fn classify(&self, url: &str) -> LinkStatus {
        let host = host_of(url);

        if host.as_deref().is_some_and(is_parking_host) {
            info!("{} is hosted by a parking provider", url);
            return LinkStatus::Parked;
        }

        match self
            .http
            .probe(ProbeRequest::head(url, self.timeouts.head))
            .await
        {
            Ok(resp) => {
                if let Some(status) = self.judge_head(url, host.as_deref(), &resp).await {
                    return status;
                }
            }
            Err(ProbeError::Timeout) => {
                info!("HEAD timed out for {}, treating as slow server", url);
                return LinkStatus::Live;
            }
            Err(e) => {
                debug!("HEAD failed for {}: {}", url, e);
            }
        }

        self.fallback(url).await
    }

    /// Decides from the HEAD response, or `None` to fall through to GET.
    async fn judge_head(
        &self,
        url: &str,
        host: Option<&str>,
        resp: &ProbeResponse,
    ) -> Option<LinkStatus> {
        if resp.final_url != url {
            if let Some(final_host) = host_of(&resp.final_url) {
                if is_parking_host(&final_host) {
                    info!("{} redirects to parking host {}", url, final_host);
                    return Some(LinkStatus::Parked);
                }
            }
        }

        if (200..400).contains(&resp.status) {
            if host.is_some_and(is_parking_exempt) {
                return Some(LinkStatus::Live);
            }
            return Some(self.sniff_content(url).await);
        }

        if resp.is_cdn_fronted() {
            info!(
                "CDN fronting detected for {} (status {}), marking live",
                url, resp.status
            );
            return Some(LinkStatus::Live);
        }

        if BLOCKING_STATUSES.contains(&resp.status) {
            info!(
                "{} returned {}, likely blocking automated requests",
                url, resp.status
            );
            return Some(LinkStatus::Live);
        }

        if resp.status >= 500 || resp.status == 404 {
            debug!("{} returned {} on HEAD, trying GET", url, resp.status);
            return None;
        }

        info!("{} returned {}, marking dead", url, resp.status);
        Some(LinkStatus::Dead)
    }

    /// Secondary GET looking for parking signatures. Failures mean live:
    /// the HEAD probe already showed the origin answers.
    async fn sniff_content(&self, url: &str) -> LinkStatus {
        let request = ProbeRequest::get(url, self.timeouts.content).with_body();
        match self.http.probe(request).await {
            Ok(resp) if resp.is_success() => match resp.body.as_deref() {
                Some(body) => {
                    let status = classify_content(body, self.thresholds);
                    if status == LinkStatus::Parked {
                        info!("{} serves a parking page", url);
                    }
                    status
                }
                None => LinkStatus::Live,
            },
            Ok(_) => LinkStatus::Live,
            Err(e) => {
                debug!("Content check failed for {}: {}", url, e);
                LinkStatus::Live
            }
        }
    }

    async fn fallback(&self, url: &str) -> LinkStatus {
        match self
            .http
            .probe(ProbeRequest::get(url, self.timeouts.fallback))
            .await
        {
            Ok(resp) if resp.is_cdn_fronted() => {
                info!("CDN fronting detected on fallback for {}", url);
                LinkStatus::Live
            }
            Ok(resp) if resp.is_success() => {
                debug!("GET fallback succeeded for {}", url);
                LinkStatus::Live
            }
            Ok(resp) => {
                info!("GET fallback returned {} for {}, marking dead", resp.status, url);
                LinkStatus::Dead
            }
            Err(ProbeError::Timeout) => {
                info!("GET timed out for {}, treating as slow server", url);
                LinkStatus::Live
            }
            Err(ProbeError::Restricted(reason)) => {
                info!("{} refused programmatic access ({}), presuming live", url, reason);
                LinkStatus::Live
            }
            Err(e) => {
                info!("Link check failed for {}: {}", url, e);
                LinkStatus::Dead
            }
        }
    }
}
