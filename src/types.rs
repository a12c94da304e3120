use serde::{Deserialize, Serialize};
use std::fmt;

/// Reachability of a bookmarked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Live,
    Dead,
    Parked,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Live => "live",
            LinkStatus::Dead => "dead",
            LinkStatus::Parked => "parked",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat verdict. `Unknown` sits outside the escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyStatus {
    Safe,
    Warning,
    Unsafe,
    Unknown,
}

impl SafetyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyStatus::Safe => "safe",
            SafetyStatus::Warning => "warning",
            SafetyStatus::Unsafe => "unsafe",
            SafetyStatus::Unknown => "unknown",
        }
    }

    /// Position in `safe < warning < unsafe`; `None` for `Unknown`.
    pub fn severity(&self) -> Option<u8> {
        match self {
            SafetyStatus::Safe => Some(0),
            SafetyStatus::Warning => Some(1),
            SafetyStatus::Unsafe => Some(2),
            SafetyStatus::Unknown => None,
        }
    }
}

impl fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyResult {
    pub status: SafetyStatus,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl SafetyResult {
    pub fn new(status: SafetyStatus, sources: Vec<String>) -> Self {
        Self { status, sources }
    }

    pub fn unknown() -> Self {
        Self::new(SafetyStatus::Unknown, Vec::new())
    }
}

/// Running verdict of one safety evaluation.
///
/// Only ever moves up `safe < warning < unsafe`. Every contribution is
/// recorded in `sources`, even when it does not change the status.
#[derive(Debug, Clone)]
pub struct Verdict {
    status: SafetyStatus,
    sources: Vec<String>,
}

impl Default for Verdict {
    fn default() -> Self {
        Self {
            status: SafetyStatus::Safe,
            sources: Vec::new(),
        }
    }
}

impl Verdict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SafetyStatus {
        self.status
    }

    /// Raises the verdict to `status` (never lowers it) and attributes `source`.
    /// `Safe` and `Unknown` contributions are ignored.
    pub fn escalate(&mut self, status: SafetyStatus, source: impl Into<String>) {
        let Some(rank) = status.severity() else {
            return;
        };
        if rank == 0 {
            return;
        }
        if rank > self.status.severity().unwrap_or(0) {
            self.status = status;
        }
        self.sources.push(source.into());
    }

    pub fn finish(self) -> SafetyResult {
        SafetyResult::new(self.status, self.sources)
    }
}
