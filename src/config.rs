use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::engine::FeedFormat;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub blocklists: BlocklistConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub reputation: ReputationConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_days")]
    pub ttl_days: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub format: FeedFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BlocklistConfig {
    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: u64,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Upper bound for callers waiting on an in-flight refresh.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_sources")]
    pub sources: Vec<FeedSource>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_head_timeout_ms")]
    pub head_timeout_ms: u64,
    #[serde(default = "default_content_timeout_ms")]
    pub content_timeout_ms: u64,
    #[serde(default = "default_fallback_timeout_ms")]
    pub fallback_timeout_ms: u64,
    #[serde(default = "default_redirect_check_timeout_ms")]
    pub redirect_check_timeout_ms: u64,
    /// Pages larger than this are treated as real content.
    #[serde(default = "default_substantial_content_bytes")]
    pub substantial_content_bytes: usize,
    #[serde(default = "default_weak_indicator_threshold")]
    pub weak_indicator_threshold: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReputationConfig {
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default)]
    pub yandex_api_key: Option<String>,
    #[serde(default)]
    pub virustotal_api_key: Option<String>,
    #[serde(default = "default_google_endpoint")]
    pub google_endpoint: String,
    #[serde(default = "default_yandex_endpoint")]
    pub yandex_endpoint: String,
    #[serde(default = "default_virustotal_base_url")]
    pub virustotal_base_url: String,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default = "default_virustotal_timeout_ms")]
    pub virustotal_timeout_ms: u64,
    #[serde(default = "default_virustotal_poll_delay_ms")]
    pub virustotal_poll_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_true")]
    pub link_checking_enabled: bool,
    #[serde(default = "default_true")]
    pub safety_checking_enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_bookmarks_path")]
    pub bookmarks_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8087
}
fn default_true() -> bool {
    true
}
fn default_storage_backend() -> String {
    "sqlite".to_string()
}
fn default_sqlite_path() -> String {
    "linkvet.db".to_string()
}
fn default_cache_ttl_days() -> u64 {
    7
}
fn default_refresh_interval_hours() -> u64 {
    24
}
fn default_download_timeout_secs() -> u64 {
    60
}
fn default_wait_timeout_secs() -> u64 {
    600
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_head_timeout_ms() -> u64 {
    10_000
}
fn default_content_timeout_ms() -> u64 {
    3_000
}
fn default_fallback_timeout_ms() -> u64 {
    8_000
}
fn default_redirect_check_timeout_ms() -> u64 {
    5_000
}
fn default_substantial_content_bytes() -> usize {
    30_000
}
fn default_weak_indicator_threshold() -> usize {
    3
}
fn default_google_endpoint() -> String {
    "https://safebrowsing.googleapis.com/v4/threatMatches:find".to_string()
}
fn default_yandex_endpoint() -> String {
    "https://sba.yandex.net/v4/threatMatches:find".to_string()
}
fn default_virustotal_base_url() -> String {
    "https://www.virustotal.com/api/v3".to_string()
}
fn default_lookup_timeout_ms() -> u64 {
    5_000
}
fn default_virustotal_timeout_ms() -> u64 {
    10_000
}
fn default_virustotal_poll_delay_ms() -> u64 {
    2_000
}
fn default_batch_size() -> usize {
    10
}
fn default_batch_delay_ms() -> u64 {
    300
}
fn default_bookmarks_path() -> String {
    "bookmarks.json".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_interval() -> u64 {
    300
}

fn source(name: &str, url: &str, format: FeedFormat) -> FeedSource {
    FeedSource {
        name: name.to_string(),
        url: url.to_string(),
        format,
    }
}

fn default_sources() -> Vec<FeedSource> {
    vec![
        source(
            "URLhaus (Active)",
            "https://urlhaus.abuse.ch/downloads/text/",
            FeedFormat::UrlhausText,
        ),
        source(
            "URLhaus (Historical)",
            "https://curbengh.github.io/malware-filter/urlhaus-filter.txt",
            FeedFormat::Domains,
        ),
        source(
            "BlockList Project (Malware)",
            "https://blocklistproject.github.io/Lists/malware.txt",
            FeedFormat::Hosts,
        ),
        source(
            "BlockList Project (Phishing)",
            "https://blocklistproject.github.io/Lists/phishing.txt",
            FeedFormat::Hosts,
        ),
        source(
            "BlockList Project (Scam)",
            "https://blocklistproject.github.io/Lists/scam.txt",
            FeedFormat::Hosts,
        ),
        source(
            "HaGeZi TIF",
            "https://cdn.jsdelivr.net/gh/hagezi/dns-blocklists@latest/domains/tif.txt",
            FeedFormat::Domains,
        ),
        source(
            "Phishing-Filter",
            "https://malware-filter.gitlab.io/malware-filter/phishing-filter-hosts.txt",
            FeedFormat::Hosts,
        ),
        source(
            "OISD Big",
            "https://raw.githubusercontent.com/sjhgvr/oisd/refs/heads/main/domainswild2_big.txt",
            FeedFormat::Domains,
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            blocklists: BlocklistConfig::default(),
            probe: ProbeConfig::default(),
            reputation: ReputationConfig::default(),
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_cache_ttl_days(),
        }
    }
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            refresh_interval_hours: default_refresh_interval_hours(),
            download_timeout_secs: default_download_timeout_secs(),
            wait_timeout_secs: default_wait_timeout_secs(),
            sources: default_sources(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            head_timeout_ms: default_head_timeout_ms(),
            content_timeout_ms: default_content_timeout_ms(),
            fallback_timeout_ms: default_fallback_timeout_ms(),
            redirect_check_timeout_ms: default_redirect_check_timeout_ms(),
            substantial_content_bytes: default_substantial_content_bytes(),
            weak_indicator_threshold: default_weak_indicator_threshold(),
        }
    }
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            yandex_api_key: None,
            virustotal_api_key: None,
            google_endpoint: default_google_endpoint(),
            yandex_endpoint: default_yandex_endpoint(),
            virustotal_base_url: default_virustotal_base_url(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            virustotal_timeout_ms: default_virustotal_timeout_ms(),
            virustotal_poll_delay_ms: default_virustotal_poll_delay_ms(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            link_checking_enabled: true,
            safety_checking_enabled: true,
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            bookmarks_path: default_bookmarks_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    pub fn blocklist_names(&self) -> Vec<String> {
        self.blocklists
            .sources
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 9000

            [probe]
            weak_indicator_threshold = 4

            [[blocklists.sources]]
            name = "local"
            url = "http://127.0.0.1:1/feed.txt"
            format = "hosts"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.probe.weak_indicator_threshold, 4);
        assert_eq!(config.probe.substantial_content_bytes, 30_000);
        assert_eq!(config.probe.head_timeout_ms, 10_000);
        assert_eq!(config.scan.batch_size, 10);
        assert_eq!(config.cache.ttl_days, 7);
        assert_eq!(config.blocklists.sources.len(), 1);
        assert_eq!(config.blocklists.sources[0].format, FeedFormat::Hosts);
        assert!(config.reputation.google_api_key.is_none());
    }

    #[test]
    fn test_unknown_feed_format_is_generic() {
        let config: Config = toml::from_str(
            r#"
            [[blocklists.sources]]
            name = "odd"
            url = "http://127.0.0.1:1/odd.txt"
            format = "adblock"
            "#,
        )
        .unwrap();
        assert_eq!(config.blocklists.sources[0].format, FeedFormat::Generic);
    }

    #[test]
    fn test_default_sources_are_ordered() {
        let names = Config::default().blocklist_names();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "URLhaus (Active)");
        assert_eq!(names[7], "OISD Big");
    }
}
