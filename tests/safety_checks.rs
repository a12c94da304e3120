mod common;

use axum::{routing::get, Router};
use common::{feed, serve, service, test_config, StubWeb};
use linkvet::engine::FeedFormat;
use linkvet::types::{SafetyResult, SafetyStatus};
use std::time::Duration;

async fn feeds_base() -> String {
    let router = Router::new()
        .route(
            "/hosts.txt",
            get(|| async { "0.0.0.0 evil.example.net\n0.0.0.0 evil.example.net\n0.0.0.0 github.com\n" }),
        )
        .route(
            "/domains.txt",
            get(|| async { "evil.example.net\n1.2.3.4:80/malware\n" }),
        )
        .route(
            "/urlhaus.txt",
            get(|| async { "http://evil.example.net/dropper.exe\n" }),
        );
    serve(router).await
}

fn feeds(base: &str) -> Vec<linkvet::config::FeedSource> {
    vec![
        feed("Hosts Feed", format!("{}/hosts.txt", base), FeedFormat::Hosts),
        feed("Domain Feed", format!("{}/domains.txt", base), FeedFormat::Domains),
        feed("URLhaus Feed", format!("{}/urlhaus.txt", base), FeedFormat::UrlhausText),
    ]
}

#[tokio::test]
async fn test_listed_domain_attributes_every_feed() {
    let base = feeds_base().await;
    let svc = service(test_config(feeds(&base)), vec![], StubWeb::new(Duration::ZERO));

    let result = svc.check_url_safety("https://evil.example.net", false).await;
    assert_eq!(
        result,
        SafetyResult::new(
            SafetyStatus::Unsafe,
            vec!["Hosts Feed".into(), "Domain Feed".into(), "URLhaus Feed".into()]
        )
    );
    assert_eq!(
        svc.stats_snapshot().blocklist_hits.get("Domain Feed"),
        Some(&1)
    );
}

#[tokio::test]
async fn test_path_entry_flags_other_paths_on_same_host_port() {
    let base = feeds_base().await;
    let svc = service(test_config(feeds(&base)), vec![], StubWeb::new(Duration::ZERO));

    let result = svc.check_url_safety("http://1.2.3.4:80/other", false).await;
    assert_eq!(
        result,
        SafetyResult::new(SafetyStatus::Unsafe, vec!["Domain Feed".into()])
    );
}

#[tokio::test]
async fn test_trusted_platform_ignores_blocklist_hit() {
    let base = feeds_base().await;
    let svc = service(test_config(feeds(&base)), vec![], StubWeb::new(Duration::ZERO));

    let result = svc.check_url_safety("https://github.com/rust-lang/rust", false).await;
    assert_eq!(result, SafetyResult::new(SafetyStatus::Safe, vec![]));
}

#[tokio::test]
async fn test_normal_site_is_safe_with_no_sources() {
    let base = feeds_base().await;
    let svc = service(test_config(feeds(&base)), vec![], StubWeb::new(Duration::ZERO));

    let result = svc.check_url_safety("https://example.com", false).await;
    assert_eq!(result.status, SafetyStatus::Safe);
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn test_heuristics_escalate_to_warning() {
    let base = feeds_base().await;
    let svc = service(test_config(feeds(&base)), vec![], StubWeb::new(Duration::ZERO));

    let result = svc.check_url_safety("http://prizes.example.xyz/claim", false).await;
    assert_eq!(
        result,
        SafetyResult::new(
            SafetyStatus::Warning,
            vec!["HTTP Only (redirects to HTTPS)".into(), "Suspicious TLD".into()]
        )
    );
}

#[tokio::test]
async fn test_loading_database_answers_unknown_without_caching() {
    let router = Router::new().route(
        "/slow.txt",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "slow-threat.test\n"
        }),
    );
    let base = serve(router).await;
    let config = test_config(vec![feed(
        "Slow Feed",
        format!("{}/slow.txt", base),
        FeedFormat::Domains,
    )]);
    let svc = service(config, vec![], StubWeb::new(Duration::ZERO));

    let refreshing = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.refresh_blocklist().await })
    };
    while !svc.is_blocklist_loading() {
        tokio::task::yield_now().await;
    }

    let during = svc.check_url_safety("https://slow-threat.test", false).await;
    assert_eq!(during, SafetyResult::unknown());

    refreshing.await.unwrap();
    let after = svc.check_url_safety("https://slow-threat.test", false).await;
    assert_eq!(
        after,
        SafetyResult::new(SafetyStatus::Unsafe, vec!["Slow Feed".into()])
    );
}

#[tokio::test]
async fn test_invalid_urls_are_unsafe() {
    let svc = service(test_config(vec![]), vec![], StubWeb::new(Duration::ZERO));
    let result = svc.check_url_safety("file:///etc/passwd", false).await;
    assert_eq!(
        result,
        SafetyResult::new(SafetyStatus::Unsafe, vec!["Invalid URL".into()])
    );
}
