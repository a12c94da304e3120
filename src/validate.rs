//! URL admission and normalization.
//!
//! Everything entering the prober or classifier from outside passes through
//! [`validate_url`] first. Rejected URLs never reach the network.

use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

const BLOCKED_SCHEMES: &[&str] = &["file", "javascript", "data", "vbscript"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlRejection {
    #[error("Invalid URL: empty")]
    Empty,
    #[error("Invalid URL format")]
    Malformed,
    #[error("Blocked URL scheme: {0}")]
    BlockedScheme(String),
    #[error("Only HTTP and HTTPS URLs are allowed (got {0})")]
    UnsupportedScheme(String),
    #[error("Private/internal addresses are not allowed")]
    PrivateAddress,
    #[error("URLs with credentials are not allowed")]
    EmbeddedCredentials,
}

/// Host-platform pages that are never probed or scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegedKind {
    BrowserInternal,
    Extension,
    ViewSource,
    Jar,
    Resource,
}

impl PrivilegedKind {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "about" | "chrome" => Some(Self::BrowserInternal),
            "moz-extension" | "chrome-extension" => Some(Self::Extension),
            "view-source" => Some(Self::ViewSource),
            "jar" => Some(Self::Jar),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BrowserInternal => "Browser internal page",
            Self::Extension => "Extension page",
            Self::ViewSource => "View source page",
            Self::Jar => "JAR resource",
            Self::Resource => "Browser resource",
        }
    }
}

pub fn privileged_kind(url: &str) -> Option<PrivilegedKind> {
    let parsed = Url::parse(url.trim()).ok()?;
    PrivilegedKind::from_scheme(parsed.scheme())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// Serialized form produced by the URL parser.
    pub url: String,
    pub privileged: bool,
}

pub fn validate_url(raw: &str) -> Result<ValidatedUrl, UrlRejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlRejection::Empty);
    }
    let url = Url::parse(raw).map_err(|_| UrlRejection::Malformed)?;
    let scheme = url.scheme().to_ascii_lowercase();

    if PrivilegedKind::from_scheme(&scheme).is_some() {
        return Ok(ValidatedUrl {
            url: url.to_string(),
            privileged: true,
        });
    }
    if BLOCKED_SCHEMES.contains(&scheme.as_str()) {
        return Err(UrlRejection::BlockedScheme(scheme));
    }
    if scheme != "http" && scheme != "https" {
        return Err(UrlRejection::UnsupportedScheme(scheme));
    }

    let internal = match url.host() {
        Some(Host::Ipv4(ip)) => is_internal_v4(ip),
        Some(Host::Ipv6(ip)) => is_internal_v6(ip),
        Some(Host::Domain(name)) => name.eq_ignore_ascii_case("localhost"),
        None => return Err(UrlRejection::Malformed),
    };
    if internal {
        return Err(UrlRejection::PrivateAddress);
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlRejection::EmbeddedCredentials);
    }

    Ok(ValidatedUrl {
        url: url.to_string(),
        privileged: false,
    })
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80
        || (first & 0xfe00) == 0xfc00
}

/// Lowercased hostname of `url`, without port or brackets.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = match parsed.host()? {
        Host::Domain(name) => name.to_ascii_lowercase(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };
    Some(host)
}

/// The three keys a URL is looked up under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    /// `domain[:port][/path]`, lowercase, no protocol, no trailing slash.
    pub normalized: String,
    /// `domain[:port]`
    pub domain: String,
    /// `domain` without the port.
    pub hostname: String,
}

impl LookupKey {
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        let without_scheme = lower
            .strip_prefix("http://")
            .or_else(|| lower.strip_prefix("https://"))
            .unwrap_or(&lower);
        let normalized = without_scheme
            .strip_suffix('/')
            .unwrap_or(without_scheme)
            .to_string();

        let domain = normalized
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let hostname = if let Some(rest) = domain.strip_prefix('[') {
            rest.split(']').next().unwrap_or_default().to_string()
        } else {
            domain.split(':').next().unwrap_or_default().to_string()
        };

        Self {
            normalized,
            domain,
            hostname,
        }
    }
}

/// Exact or subdomain match of `host` against `list`.
pub fn matches_domain_list(host: &str, list: &[&str]) -> bool {
    let host = host.to_ascii_lowercase();
    list.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}
