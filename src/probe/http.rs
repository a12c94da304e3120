//! The network seam used by the prober and the safety heuristics.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, Method};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Head,
    Get,
}

#[derive(Debug, Clone)]
pub struct ProbeRequest<'a> {
    pub url: &'a str,
    pub method: ProbeMethod,
    pub timeout: Duration,
    /// Read the response body into [`ProbeResponse::body`].
    pub read_body: bool,
}

impl<'a> ProbeRequest<'a> {
    pub fn head(url: &'a str, timeout: Duration) -> Self {
        Self {
            url,
            method: ProbeMethod::Head,
            timeout,
            read_body: false,
        }
    }

    pub fn get(url: &'a str, timeout: Duration) -> Self {
        Self {
            url,
            method: ProbeMethod::Get,
            timeout,
            read_body: false,
        }
    }

    pub fn with_body(mut self) -> Self {
        self.read_body = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `server: cloudflare` or a `cf-ray` id means a CDN fronts the origin.
    pub fn is_cdn_fronted(&self) -> bool {
        let server_is_cdn = self
            .headers
            .get("server")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains("cloudflare"));
        server_is_cdn || self.headers.contains_key("cf-ray")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,
    /// DNS failure or refused/reset connection.
    #[error("unreachable: {0}")]
    Unreachable(String),
    /// The origin answered but refused to complete the exchange
    /// (redirect loop, truncated or undecodable body).
    #[error("restricted: {0}")]
    Restricted(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout
        } else if e.is_connect() {
            ProbeError::Unreachable(e.to_string())
        } else if e.is_redirect() || e.is_body() || e.is_decode() {
            ProbeError::Restricted(e.to_string())
        } else {
            ProbeError::Other(e.to_string())
        }
    }
}

#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn probe(&self, request: ProbeRequest<'_>) -> Result<ProbeResponse, ProbeError>;
}

/// reqwest-backed probe. Follows redirects, never sends cookies.
pub struct ReqwestProbe {
    client: Client,
    user_agent: String,
}

impl ReqwestProbe {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn probe(&self, request: ProbeRequest<'_>) -> Result<ProbeResponse, ProbeError> {
        let method = match request.method {
            ProbeMethod::Head => Method::HEAD,
            ProbeMethod::Get => Method::GET,
        };
        let resp = self
            .client
            .request(method, request.url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(request.timeout)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let headers = resp.headers().clone();
        let body = if request.read_body {
            Some(resp.text().await?)
        } else {
            None
        };

        Ok(ProbeResponse {
            status,
            final_url,
            headers,
            body,
        })
    }
}
