//! Local pattern checks that run on every safety evaluation.

use crate::probe::{HttpProbe, ProbeRequest};
use crate::validate::LookupKey;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub const HTTP_REDIRECTS_TO_HTTPS: &str = "HTTP Only (redirects to HTTPS)";
pub const HTTP_UNENCRYPTED: &str = "HTTP Only (Unencrypted)";
pub const URL_SHORTENER: &str = "URL Shortener";
pub const SUSPICIOUS_TLD: &str = "Suspicious TLD";
pub const IP_ADDRESS: &str = "IP Address";

const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "t.co",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "adf.ly",
    "bl.ink",
    "lnkd.in",
    "short.link",
    "cutt.ly",
    "rebrand.ly",
    "tiny.cc",
    "rb.gy",
    "clck.ru",
    "shorturl.at",
    "v.gd",
];

// Commonly abused TLDs.
const SUSPICIOUS_TLDS: &[&str] = &[
    ".xyz", ".top", ".tk", ".ml", ".ga", ".cf", ".gq", ".pw", ".cc", ".ws", ".info", ".biz",
    ".club", ".click", ".link", ".download", ".stream", ".loan", ".win", ".bid", ".trade",
    ".racing", ".party", ".review", ".science", ".work", ".date", ".faith", ".cricket",
    ".accountant",
];

pub fn is_url_shortener(hostname: &str) -> bool {
    URL_SHORTENERS.contains(&hostname)
}

pub fn has_suspicious_tld(hostname: &str) -> bool {
    SUSPICIOUS_TLDS.iter().any(|tld| hostname.ends_with(tld))
}

pub fn is_ip_literal(hostname: &str) -> bool {
    hostname.parse::<IpAddr>().is_ok()
}

/// Labels for every pattern `url` exhibits.
///
/// Plain-http URLs cost one HEAD request to see whether the site upgrades
/// to https; an unreachable site counts as not upgrading.
pub async fn suspicious_patterns(
    url: &str,
    key: &LookupKey,
    http: &dyn HttpProbe,
    redirect_timeout: Duration,
) -> Vec<&'static str> {
    let mut patterns = Vec::new();

    if url.to_ascii_lowercase().starts_with("http://") {
        let upgrades = match http.probe(ProbeRequest::head(url, redirect_timeout)).await {
            Ok(resp) => resp.final_url.to_ascii_lowercase().starts_with("https://"),
            Err(e) => {
                debug!("Could not check https redirect for {}: {}", url, e);
                false
            }
        };
        patterns.push(if upgrades {
            HTTP_REDIRECTS_TO_HTTPS
        } else {
            HTTP_UNENCRYPTED
        });
    }

    let hostname = key.hostname.as_str();
    if is_url_shortener(hostname) {
        patterns.push(URL_SHORTENER);
    }
    if has_suspicious_tld(hostname) {
        patterns.push(SUSPICIOUS_TLD);
    }
    if is_ip_literal(hostname) {
        patterns.push(IP_ADDRESS);
    }

    patterns
}
