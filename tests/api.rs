mod common;

use axum::{routing::get, Router};
use common::{bookmark, feed, serve, service, test_config, StubWeb};
use futures::StreamExt;
use linkvet::api::router;
use linkvet::engine::FeedFormat;
use serde_json::{json, Value};
use std::time::Duration;

async fn api() -> String {
    let feeds = serve(Router::new().route("/feed.txt", get(|| async { "listed.example.net\n" }))).await;
    let config = test_config(vec![feed(
        "Feed",
        format!("{}/feed.txt", feeds),
        FeedFormat::Domains,
    )]);
    let svc = service(
        config,
        vec![bookmark("1", "https://example.com/")],
        StubWeb::new(Duration::ZERO),
    );
    serve(router(svc, None)).await
}

async fn message(base: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/message", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_single_url_actions() {
    let base = api().await;

    let (code, body) = message(
        &base,
        json!({"action": "checkLinkStatus", "url": "https://example.com/"}),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body, json!({"status": "live"}));

    let (_, body) = message(
        &base,
        json!({"action": "checkURLSafety", "url": "https://listed.example.net", "bypassCache": true}),
    )
    .await;
    assert_eq!(body, json!({"status": "unsafe", "sources": ["Feed"]}));

    let (_, body) = message(
        &base,
        json!({"action": "checkLinkStatus", "url": "javascript:alert(1)"}),
    )
    .await;
    assert_eq!(body, json!({"status": "dead"}));
}

#[tokio::test]
async fn test_blocklist_actions() {
    let base = api().await;

    let (_, body) = message(&base, json!({"action": "isBlocklistLoading"})).await;
    assert_eq!(body, json!({"isLoading": false}));

    let (_, body) = message(&base, json!({"action": "ensureBlocklistReady"})).await;
    assert_eq!(body, json!({"ready": true, "size": 1}));

    let (_, body) = message(&base, json!({"action": "waitForBlocklist"})).await;
    assert_eq!(body, json!({"ready": true}));
}

#[tokio::test]
async fn test_scan_actions() {
    let base = api().await;

    let (_, body) = message(&base, json!({"action": "getBackgroundScanStatus"})).await;
    assert_eq!(body, json!({"isScanning": false, "scannedCount": 0, "total": 0}));

    let (_, body) = message(&base, json!({"action": "stopBackgroundScan"})).await;
    assert_eq!(body, json!({"success": false, "message": "No scan in progress"}));

    let (_, body) = message(&base, json!({"action": "startBackgroundScan"})).await;
    assert_eq!(body, json!({"success": true, "total": 1}));

    let status: Value = reqwest::get(format!("{}/api/scan/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["total"], 1);
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let base = api().await;
    let (code, body) = message(&base, json!({"action": "formatDisk"})).await;
    assert_eq!(code, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let base = api().await;
    message(
        &base,
        json!({"action": "checkLinkStatus", "url": "https://example.com/"}),
    )
    .await;

    let stats: Value = reqwest::get(format!("{}/api/stats", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["linksChecked"], 1);
    assert_eq!(stats["live"], 1);
}

#[tokio::test]
async fn test_forced_refresh_streams_events() {
    let base = api().await;
    let client = reqwest::Client::new();

    let events = client
        .get(format!("{}/api/events", base))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status().as_u16(), 200);
    let mut stream = events.bytes_stream();

    let trigger: Value = client
        .post(format!("{}/api/blocklist/refresh", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(trigger, json!({"status": "refresh_triggered"}));

    let mut seen = String::new();
    let found = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(chunk) = stream.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains("\"type\":\"blocklistComplete\"") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "no completion event in: {}", seen);
    assert!(seen.contains("\"type\":\"blocklistProgress\""));
}
