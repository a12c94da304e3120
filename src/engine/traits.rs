use crate::validate::LookupKey;

/// Which of the three lookup keys produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The full normalized URL is listed.
    FullUrl,
    /// The bare `domain[:port]` is listed.
    Domain,
    /// A listed entry shares the `domain:port` but carries its own path.
    PathPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatMatch {
    pub kind: MatchKind,
    /// Feed names that listed the entry, in first-seen order.
    pub sources: Vec<String>,
}

/// The "Hot Path" lookup against the aggregated blocklists.
pub trait BlocklistMatcher: Send + Sync {
    fn check(&self, key: &LookupKey) -> Option<ThreatMatch>;

    /// Number of distinct entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
