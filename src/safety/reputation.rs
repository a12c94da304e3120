//! External reputation services.
//!
//! Each provider is optional; a provider without credentials is simply not
//! constructed. Every failure degrades to [`SafetyStatus::Unknown`].

use crate::config::ReputationConfig;
use crate::types::SafetyStatus;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const CLIENT_ID: &str = "bookmark-manager-zero";

#[async_trait]
pub trait ReputationApi: Send + Sync {
    /// Attribution label added to the verdict.
    fn name(&self) -> &str;

    async fn check(&self, url: &str) -> SafetyStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatMatchFlavor {
    Google,
    Yandex,
}

impl ThreatMatchFlavor {
    fn label(self) -> &'static str {
        match self {
            ThreatMatchFlavor::Google => "Google Safe Browsing",
            ThreatMatchFlavor::Yandex => "Yandex Safe Browsing",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThreatMatches {
    #[serde(default)]
    matches: Vec<Value>,
}

/// `threatMatches:find` lookup shared by Google and Yandex Safe Browsing.
pub struct ThreatMatchApi {
    flavor: ThreatMatchFlavor,
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ThreatMatchApi {
    pub fn new(
        flavor: ThreatMatchFlavor,
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            flavor,
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn request_body(&self, url: &str) -> Value {
        match self.flavor {
            ThreatMatchFlavor::Google => json!({
                "client": {
                    "clientId": CLIENT_ID,
                    "clientVersion": env!("CARGO_PKG_VERSION"),
                },
                "threatInfo": {
                    "threatTypes": [
                        "MALWARE",
                        "SOCIAL_ENGINEERING",
                        "UNWANTED_SOFTWARE",
                        "POTENTIALLY_HARMFUL_APPLICATION"
                    ],
                    "platformTypes": ["ANY_PLATFORM"],
                    "threatEntryTypes": ["URL"],
                    "threatEntries": [{ "url": url }],
                }
            }),
            ThreatMatchFlavor::Yandex => json!({
                "threatInfo": {
                    "threatTypes": ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"],
                    "platformTypes": ["ANY_PLATFORM"],
                    "threatEntryTypes": ["URL"],
                    "threatEntries": [{ "url": url }],
                }
            }),
        }
    }

    async fn lookup(&self, url: &str) -> Result<SafetyStatus> {
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(url))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body: ThreatMatches = resp.json().await.context("Malformed threatMatches response")?;
        if body.matches.is_empty() {
            debug!("{}: no threats found for {}", self.name(), url);
            Ok(SafetyStatus::Safe)
        } else {
            let threat = body.matches[0]
                .get("threatType")
                .and_then(Value::as_str)
                .unwrap_or("unspecified");
            info!("{}: threat detected for {} ({})", self.name(), url, threat);
            Ok(SafetyStatus::Unsafe)
        }
    }
}

#[async_trait]
impl ReputationApi for ThreatMatchApi {
    fn name(&self) -> &str {
        self.flavor.label()
    }

    async fn check(&self, url: &str) -> SafetyStatus {
        self.lookup(url).await.unwrap_or_else(|e| {
            warn!("{} lookup failed for {}: {:#}", self.name(), url, e);
            SafetyStatus::Unknown
        })
    }
}

/// Submit-then-poll URL analysis.
pub struct VirusTotalApi {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    poll_delay: Duration,
}

impl VirusTotalApi {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        poll_delay: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            poll_delay,
        }
    }

    async fn lookup(&self, url: &str) -> Result<SafetyStatus> {
        let submitted: Value = self
            .client
            .post(format!("{}/urls", self.base_url))
            .header("x-apikey", &self.api_key)
            .form(&[("url", url)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed submission response")?;

        let analysis_id = submitted
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("No analysis id returned"))?;

        tokio::time::sleep(self.poll_delay).await;

        let analysis: Value = self
            .client
            .get(format!("{}/analyses/{}", self.base_url, analysis_id))
            .header("x-apikey", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed analysis response")?;

        let stats = analysis
            .pointer("/data/attributes/stats")
            .ok_or_else(|| anyhow!("No stats in analysis results"))?;
        let count = |field: &str| stats.get(field).and_then(Value::as_u64).unwrap_or(0);
        let malicious = count("malicious");
        let suspicious = count("suspicious");

        debug!(
            "VirusTotal: {} malicious, {} suspicious for {}",
            malicious, suspicious, url
        );
        Ok(Self::classify(malicious, suspicious))
    }

    fn classify(malicious: u64, suspicious: u64) -> SafetyStatus {
        if malicious >= 2 {
            SafetyStatus::Unsafe
        } else if malicious >= 1 || suspicious >= 2 {
            SafetyStatus::Warning
        } else {
            SafetyStatus::Safe
        }
    }
}

#[async_trait]
impl ReputationApi for VirusTotalApi {
    fn name(&self) -> &str {
        "VirusTotal"
    }

    async fn check(&self, url: &str) -> SafetyStatus {
        self.lookup(url).await.unwrap_or_else(|e| {
            warn!("VirusTotal lookup failed for {}: {:#}", url, e);
            SafetyStatus::Unknown
        })
    }
}

/// The providers that have credentials, in query order.
#[derive(Clone, Default)]
pub struct ReputationApis {
    providers: Vec<Arc<dyn ReputationApi>>,
}

fn usable_key(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}

impl ReputationApis {
    pub fn from_config(config: &ReputationConfig, client: &Client) -> Self {
        let lookup_timeout = Duration::from_millis(config.lookup_timeout_ms);
        let mut providers: Vec<Arc<dyn ReputationApi>> = Vec::new();

        if let Some(key) = usable_key(&config.google_api_key) {
            providers.push(Arc::new(ThreatMatchApi::new(
                ThreatMatchFlavor::Google,
                client.clone(),
                &config.google_endpoint,
                key,
                lookup_timeout,
            )));
        }
        if let Some(key) = usable_key(&config.yandex_api_key) {
            providers.push(Arc::new(ThreatMatchApi::new(
                ThreatMatchFlavor::Yandex,
                client.clone(),
                &config.yandex_endpoint,
                key,
                lookup_timeout,
            )));
        }
        if let Some(key) = usable_key(&config.virustotal_api_key) {
            providers.push(Arc::new(VirusTotalApi::new(
                client.clone(),
                &config.virustotal_base_url,
                key,
                Duration::from_millis(config.virustotal_timeout_ms),
                Duration::from_millis(config.virustotal_poll_delay_ms),
            )));
        }

        Self { providers }
    }

    pub fn new(providers: Vec<Arc<dyn ReputationApi>>) -> Self {
        Self { providers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ReputationApi>> {
        self.providers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
