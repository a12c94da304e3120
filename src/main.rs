use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{error, info};

use linkvet::config::Config;
use linkvet::engine::RefreshOutcome;
use linkvet::init::{init_store, setup_logging};
use linkvet::scan::JsonBookmarkSource;
use linkvet::service::Service;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args().nth(1).unwrap_or("linkvet.toml".to_string());
    let config_exists = std::path::Path::new(&config_path).exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting linkvet...");

    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    // 3. Store, bookmarks and the service
    let store = init_store(&config)?;
    let bookmarks = Arc::new(JsonBookmarkSource::new(&config.scan.bookmarks_path));
    let service = Arc::new(Service::from_config(config.clone(), store, bookmarks)?);

    if config.stats.enable {
        service
            .stats()
            .start_reporting(config.stats.log_interval_seconds);
    }

    // 4. Preload the threat database, then keep it fresh
    let refresh_interval = Duration::from_secs(config.blocklists.refresh_interval_hours * 3600);
    let (refresh_tx, mut refresh_rx) = tokio::sync::mpsc::channel::<()>(1);
    let service_for_loop = service.clone();

    tokio::spawn(async move {
        info!("Preloading blocklist database...");
        let started = Instant::now();
        if let RefreshOutcome::Completed(summary) = service_for_loop.refresh_blocklist().await {
            info!(
                "Blocklist database loaded in {:.1}s with {} entries",
                started.elapsed().as_secs_f64(),
                summary.domains
            );
        }

        let mut interval = tokio::time::interval(refresh_interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    info!("Scheduled blocklist update...");
                }
                _ = refresh_rx.recv() => {
                    info!("Forced blocklist update triggered via API...");
                    interval.reset(); // Reset timer to avoid double update
                }
            }
            service_for_loop.refresh_blocklist().await;
        }
    });

    // 5. Start API Server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let api_service = service.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = linkvet::api::start_api_server(api_service, refresh_tx, addr).await {
            error!("{:#}", e);
        }
    });

    // 6. Graceful Shutdown
    tokio::select! {
        _ = server => {},
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
