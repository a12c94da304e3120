//! Line parsers for the supported blocklist feed formats.
//!
//! Each parser is a pure `line -> Option<entry>` function; the shared
//! normalization step runs on whatever the format-specific step extracted.

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedFormat {
    /// `0.0.0.0 domain.example`
    Hosts,
    /// One domain (optionally `*.`-prefixed) per line.
    Domains,
    /// One full URL per line; only the hostname is kept.
    UrlhausText,
    #[default]
    Generic,
}

impl From<String> for FeedFormat {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "hosts" => FeedFormat::Hosts,
            "domains" => FeedFormat::Domains,
            "urlhaus_text" => FeedFormat::UrlhausText,
            _ => FeedFormat::Generic,
        }
    }
}

impl From<FeedFormat> for String {
    fn from(format: FeedFormat) -> Self {
        match format {
            FeedFormat::Hosts => "hosts",
            FeedFormat::Domains => "domains",
            FeedFormat::UrlhausText => "urlhaus_text",
            FeedFormat::Generic => "generic",
        }
        .to_string()
    }
}

impl FeedFormat {
    pub fn parse_line(self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            return None;
        }

        let raw = match self {
            FeedFormat::Hosts => parse_hosts(line)?,
            FeedFormat::UrlhausText => parse_urlhaus_text(line)?,
            FeedFormat::Domains | FeedFormat::Generic => line.to_string(),
        };
        normalize_entry(&raw)
    }
}

fn parse_hosts(line: &str) -> Option<String> {
    line.split_whitespace().nth(1).map(str::to_string)
}

fn parse_urlhaus_text(line: &str) -> Option<String> {
    if !(line.starts_with("http://") || line.starts_with("https://")) {
        return None;
    }
    let url = Url::parse(line).ok()?;
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// Lowercases and strips protocol, one trailing slash and a `*.` wildcard
/// label. Loopback and null-route entries are dropped.
pub fn normalize_entry(raw: &str) -> Option<String> {
    let lower = raw.to_lowercase();
    let mut entry = lower.as_str();
    entry = entry
        .strip_prefix("http://")
        .or_else(|| entry.strip_prefix("https://"))
        .unwrap_or(entry);
    entry = entry.strip_suffix('/').unwrap_or(entry);
    entry = entry.strip_prefix("*.").unwrap_or(entry);

    if entry.is_empty()
        || entry == "localhost"
        || entry.starts_with("127.")
        || entry.starts_with("0.0.0.0")
    {
        return None;
    }
    Some(entry.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_comments_and_blanks() {
        for format in [
            FeedFormat::Hosts,
            FeedFormat::Domains,
            FeedFormat::UrlhausText,
            FeedFormat::Generic,
        ] {
            assert_eq!(format.parse_line(""), None);
            assert_eq!(format.parse_line("   "), None);
            assert_eq!(format.parse_line("# comment"), None);
            assert_eq!(format.parse_line("! adblock header"), None);
        }
    }

    #[test]
    fn test_hosts_format() {
        let f = FeedFormat::Hosts;
        assert_eq!(f.parse_line("0.0.0.0 Malware.Example"), Some("malware.example".into()));
        assert_eq!(f.parse_line("127.0.0.1\tads.example  # tail"), Some("ads.example".into()));
        assert_eq!(f.parse_line("0.0.0.0 0.0.0.0"), None);
        assert_eq!(f.parse_line("127.0.0.1 localhost"), None);
        assert_eq!(f.parse_line("lonely-token"), None);
    }

    #[test]
    fn test_urlhaus_text_format() {
        let f = FeedFormat::UrlhausText;
        assert_eq!(
            f.parse_line("http://Bad.Example:8080/bins/mozi.m"),
            Some("bad.example".into())
        );
        assert_eq!(f.parse_line("https://1.2.3.4/x.sh"), Some("1.2.3.4".into()));
        assert_eq!(f.parse_line("bad.example/path"), None);
        assert_eq!(f.parse_line("http://"), None);
    }

    #[test]
    fn test_domain_formats_normalize() {
        let f = FeedFormat::Domains;
        assert_eq!(f.parse_line("*.tracker.example"), Some("tracker.example".into()));
        assert_eq!(f.parse_line("https://phish.example/"), Some("phish.example".into()));
        assert_eq!(
            f.parse_line("1.2.3.4:80/malware"),
            Some("1.2.3.4:80/malware".into())
        );
        assert_eq!(f.parse_line("127.0.0.2"), None);
        assert_eq!(FeedFormat::Generic.parse_line("  Plain.Example  "), Some("plain.example".into()));
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(FeedFormat::from("urlhaus_text".to_string()), FeedFormat::UrlhausText);
        assert_eq!(FeedFormat::from("HOSTS".to_string()), FeedFormat::Hosts);
        assert_eq!(FeedFormat::from("whatever".to_string()), FeedFormat::Generic);
        assert_eq!(String::from(FeedFormat::Domains), "domains");
    }
}
