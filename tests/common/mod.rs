#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use linkvet::config::{Config, FeedSource};
use linkvet::engine::FeedFormat;
use linkvet::probe::{HttpProbe, ProbeError, ProbeRequest, ProbeResponse};
use linkvet::scan::{Bookmark, BookmarkSource, MemoryBookmarkSource};
use linkvet::service::Service;
use linkvet::store::MemoryStore;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn feed(name: &str, url: String, format: FeedFormat) -> FeedSource {
    FeedSource {
        name: name.to_string(),
        url,
        format,
    }
}

pub fn bookmark(id: &str, url: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        url: url.to_string(),
        title: format!("Bookmark {}", id),
    }
}

/// A web where every URL answers 200 with a large page, after `delay`.
pub struct StubWeb {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StubWeb {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpProbe for StubWeb {
    async fn probe(&self, request: ProbeRequest<'_>) -> Result<ProbeResponse, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ProbeResponse {
            status: 200,
            final_url: request.url.replacen("http://", "https://", 1),
            headers: HeaderMap::new(),
            body: request
                .read_body
                .then(|| "<p>Plenty of real content.</p>".repeat(2_000)),
        })
    }
}

pub fn test_config(sources: Vec<FeedSource>) -> Config {
    let mut config = Config::default();
    config.storage.backend = "memory".into();
    config.blocklists.sources = sources;
    config.blocklists.download_timeout_secs = 5;
    config.blocklists.wait_timeout_secs = 10;
    config.scan.batch_delay_ms = 0;
    config
}

pub fn service(config: Config, bookmarks: Vec<Bookmark>, web: Arc<StubWeb>) -> Arc<Service> {
    service_with(config, Arc::new(MemoryBookmarkSource::new(bookmarks)), web)
}

pub fn service_with(
    config: Config,
    bookmarks: Arc<dyn BookmarkSource>,
    web: Arc<dyn HttpProbe>,
) -> Arc<Service> {
    Arc::new(Service::new(
        config,
        Arc::new(MemoryStore::new()),
        bookmarks,
        reqwest::Client::new(),
        web,
    ))
}
