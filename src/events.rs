//! Progress events pushed to the UI boundary.
//!
//! Delivery is fire-and-forget: with no subscriber attached, events are
//! dropped and the emitter carries on.

use crate::scan::BookmarkScanResult;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlocklistPhase {
    Starting,
    Downloading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    ScanStarted { total: usize },
    #[serde(rename_all = "camelCase")]
    ScanStatus { message: String },
    #[serde(rename_all = "camelCase")]
    ScanProgress {
        scanned: usize,
        total: usize,
        result: BookmarkScanResult,
    },
    #[serde(rename_all = "camelCase")]
    ScanComplete { scanned: usize, total: usize },
    #[serde(rename_all = "camelCase")]
    ScanCancelled { scanned: usize, total: usize },
    #[serde(rename_all = "camelCase")]
    BlocklistProgress {
        current: usize,
        total: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_name: Option<String>,
        status: BlocklistPhase,
    },
    #[serde(rename_all = "camelCase")]
    BlocklistComplete {
        domains: usize,
        total_entries: usize,
        sources: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
