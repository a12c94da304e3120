//! Threat database: blocklist feed aggregation and lookup.

mod manager;
mod matcher;
mod parser;
pub mod state;
mod traits;

pub use manager::{RefreshOutcome, RefreshSummary, ThreatDatabase, LAST_UPDATE_KEY};
pub use matcher::{HashedMatcher, MatcherBuilder};
pub use parser::{normalize_entry, FeedFormat};
pub use state::RefreshState;
pub use traits::{BlocklistMatcher, MatchKind, ThreatMatch};
