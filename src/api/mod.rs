//! Messaging boundary: the action dispatcher and its HTTP surface.

use crate::events::Event as ProgressEvent;
use crate::scan::{ScanAck, ScanStatus};
use crate::service::Service;
use crate::types::{LinkStatus, SafetyResult};
use anyhow::{Context, Result};
use axum::{
    extract::{Json as AxumJson, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    CheckLinkStatus {
        url: String,
        #[serde(default)]
        bypass_cache: bool,
    },
    #[serde(rename = "checkURLSafety", rename_all = "camelCase")]
    CheckUrlSafety {
        url: String,
        #[serde(default)]
        bypass_cache: bool,
    },
    StartBackgroundScan,
    StopBackgroundScan,
    #[serde(alias = "getBackgroundScanStatus")]
    GetScanStatus,
    IsBlocklistLoading,
    WaitForBlocklist,
    EnsureBlocklistReady,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Link {
        status: LinkStatus,
    },
    Safety(SafetyResult),
    Scan(ScanAck),
    ScanStatus(ScanStatus),
    Loading {
        #[serde(rename = "isLoading")]
        is_loading: bool,
    },
    Ready {
        ready: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<usize>,
    },
}

pub async fn dispatch(service: &Service, request: Request) -> Response {
    debug!("Dispatching {:?}", request);
    match request {
        Request::CheckLinkStatus { url, bypass_cache } => Response::Link {
            status: service.check_link_status(&url, bypass_cache).await,
        },
        Request::CheckUrlSafety { url, bypass_cache } => {
            Response::Safety(service.check_url_safety(&url, bypass_cache).await)
        }
        Request::StartBackgroundScan => Response::Scan(service.start_scan().await),
        Request::StopBackgroundScan => Response::Scan(service.stop_scan()),
        Request::GetScanStatus => Response::ScanStatus(service.scan_status()),
        Request::IsBlocklistLoading => Response::Loading {
            is_loading: service.is_blocklist_loading(),
        },
        Request::WaitForBlocklist => Response::Ready {
            ready: service.wait_for_blocklist().await,
            size: None,
        },
        Request::EnsureBlocklistReady => {
            let (ready, size) = service.ensure_blocklist_ready().await;
            Response::Ready {
                ready,
                size: Some(size),
            }
        }
    }
}

struct ApiState {
    service: Arc<Service>,
    refresh_sender: Option<Sender<()>>,
}

/// Builds the router. Without a `refresh_sender`, forced refreshes run
/// inline on a spawned task.
pub fn router(service: Arc<Service>, refresh_sender: Option<Sender<()>>) -> Router {
    let state = Arc::new(ApiState {
        service,
        refresh_sender,
    });

    Router::new()
        .route("/api/message", post(handle_message))
        .route("/api/scan/status", get(get_scan_status))
        .route("/api/blocklist/refresh", post(trigger_refresh))
        .route("/api/stats", get(get_stats))
        .route("/api/events", get(get_events))
        .with_state(state)
}

pub async fn start_api_server(
    service: Arc<Service>,
    refresh_sender: Sender<()>,
    addr: SocketAddr,
) -> Result<()> {
    let app = router(service, Some(refresh_sender));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!("API Server listening on http://{}", addr);
    axum::serve(listener, app).await.context("API server failed")
}

async fn handle_message(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<Value>,
) -> impl IntoResponse {
    let request: Request = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected message: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };
    Json(dispatch(&state.service, request).await).into_response()
}

async fn get_scan_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.service.scan_status())
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.service.stats_snapshot())
}

async fn trigger_refresh(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match &state.refresh_sender {
        Some(sender) => match sender.try_send(()) {
            // A pending request already covers this one.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => {
                warn!("Refresh loop is gone, ignoring forced refresh");
            }
        },
        None => {
            let service = state.service.clone();
            tokio::spawn(async move {
                service.refresh_blocklist().await;
            });
        }
    }
    Json(serde_json::json!({ "status": "refresh_triggered" }))
}

async fn get_events(
    State(state): State<Arc<ApiState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.service.subscribe();
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(progress) => {
                    if let Some(event) = to_sse(&progress) {
                        return Some((Ok(event), rx));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(progress: &ProgressEvent) -> Option<Event> {
    match Event::default().json_data(progress) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to encode progress event: {}", e);
            None
        }
    }
}
