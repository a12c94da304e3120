use super::traits::{BlocklistMatcher, MatchKind, ThreatMatch};
use crate::validate::LookupKey;
use rustc_hash::FxHashMap;
use std::sync::Arc;

type Attribution = Vec<Arc<str>>;

/// Optimized in-memory index using FxHashMap<Box<str>, sources>.
#[derive(Debug, Default)]
pub struct HashedMatcher {
    // entry -> feeds that listed it
    entries: FxHashMap<Box<str>, Attribution>,
    // bare domain:port -> feeds, for entries listed with a path suffix
    path_index: FxHashMap<Box<str>, Attribution>,
}

impl HashedMatcher {
    pub fn builder() -> MatcherBuilder {
        MatcherBuilder::default()
    }
}

fn attribute(map: &mut FxHashMap<Box<str>, Attribution>, key: &str, source: &Arc<str>) {
    match map.get_mut(key) {
        Some(sources) => {
            if !sources.iter().any(|s| s == source) {
                sources.push(source.clone());
            }
        }
        None => {
            map.insert(key.into(), vec![source.clone()]);
        }
    }
}

fn to_names(sources: &Attribution) -> Vec<String> {
    sources.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Default)]
pub struct MatcherBuilder {
    inner: HashedMatcher,
    raw_count: usize,
}

impl MatcherBuilder {
    pub fn insert(&mut self, entry: &str, source: &Arc<str>) {
        self.raw_count += 1;
        attribute(&mut self.inner.entries, entry, source);

        if let Some((domain_part, _path)) = entry.split_once('/') {
            attribute(&mut self.inner.path_index, domain_part, source);
        }
    }

    /// Entries inserted so far, duplicates included.
    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    pub fn build(self) -> HashedMatcher {
        self.inner
    }
}

impl BlocklistMatcher for HashedMatcher {
    fn check(&self, key: &LookupKey) -> Option<ThreatMatch> {
        if let Some(sources) = self.entries.get(key.normalized.as_str()) {
            return Some(ThreatMatch {
                kind: MatchKind::FullUrl,
                sources: to_names(sources),
            });
        }
        if let Some(sources) = self.entries.get(key.domain.as_str()) {
            return Some(ThreatMatch {
                kind: MatchKind::Domain,
                sources: to_names(sources),
            });
        }
        self.path_index
            .get(key.domain.as_str())
            .map(|sources| ThreatMatch {
                kind: MatchKind::PathPrefix,
                sources: to_names(sources),
            })
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(entries: &[(&str, &str)]) -> HashedMatcher {
        let mut builder = HashedMatcher::builder();
        for (entry, source) in entries {
            builder.insert(entry, &Arc::from(*source));
        }
        builder.build()
    }

    #[test]
    fn test_matcher_logic() {
        let matcher = build(&[
            ("bad.example", "Feed A"),
            ("bad.example", "Feed B"),
            ("bad.example", "Feed A"),
            ("cdn.example/evil.js", "Feed C"),
            ("1.2.3.4:80/malware", "URLhaus"),
        ]);

        assert_eq!(matcher.len(), 3);

        // Exact domain, attribution deduplicated but ordered
        let hit = matcher
            .check(&LookupKey::from_url("https://bad.example/"))
            .unwrap();
        assert_eq!(hit.kind, MatchKind::FullUrl);
        assert_eq!(hit.sources, vec!["Feed A", "Feed B"]);

        // Domain of a deeper URL
        let hit = matcher
            .check(&LookupKey::from_url("https://bad.example/some/page"))
            .unwrap();
        assert_eq!(hit.kind, MatchKind::Domain);

        // Exact URL with path
        let hit = matcher
            .check(&LookupKey::from_url("http://cdn.example/evil.js"))
            .unwrap();
        assert_eq!(hit.kind, MatchKind::FullUrl);
        assert_eq!(hit.sources, vec!["Feed C"]);

        // Same host:port, different path
        let hit = matcher
            .check(&LookupKey::from_url("http://1.2.3.4:80/other"))
            .unwrap();
        assert_eq!(hit.kind, MatchKind::PathPrefix);
        assert_eq!(hit.sources, vec!["URLhaus"]);

        // Subdomains are not implied
        assert!(matcher
            .check(&LookupKey::from_url("https://sub.bad.example/"))
            .is_none());
        assert!(matcher
            .check(&LookupKey::from_url("https://good.example/"))
            .is_none());
    }
}
