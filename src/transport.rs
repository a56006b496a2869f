//! Network transport: one response shape, two routes.
//! Direct requests go straight to the provider; relayed requests are
//! forwarded through a privileged proxy when direct access is blocked.
//! `FallbackTransport` tries direct first and relays on transport failure.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{StartupError, TransportError};

/// Which path produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Relay,
}

/// Uniform `{ok, status, text, json}` response regardless of route.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    status: u16,
    status_text: String,
    body: String,
    route: Route,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>, route: Route) -> Self {
        Self {
            status,
            status_text: String::new(),
            body: body.into(),
            route,
        }
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// 2xx status.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    pub fn route(&self) -> Route {
        self.route
    }
}

/// A GET-only HTTP seam. Implementations enforce their own timeout.
pub trait HttpTransport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, TransportError>>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .build()
}

fn request_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Plain reqwest client, short timeout.
pub struct DirectTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl DirectTransport {
    pub fn new(timeout: Duration) -> Result<Self, StartupError> {
        let http = http_client(timeout).map_err(|e| StartupError::HttpClient(e.to_string()))?;
        Ok(Self { http, timeout })
    }
}

impl HttpTransport for DirectTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, TransportError>> {
        Box::pin(async move {
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| request_error(e, self.timeout))?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| request_error(e, self.timeout))?;
            debug!(status = status.as_u16(), bytes = body.len(), "direct fetch done");
            Ok(FetchResponse::new(status.as_u16(), body, Route::Direct)
                .with_status_text(status.canonical_reason().unwrap_or_default()))
        })
    }
}

/// Message sent to the relay.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub init: RelayInit,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayInit {
    pub method: String,
}

impl RelayRequest {
    pub const KIND: &'static str = "WORDGLANCE_FETCH";

    pub fn get(url: &str) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            url: url.to_string(),
            init: RelayInit {
                method: "GET".to_string(),
            },
        }
    }
}

/// Relay reply: either a proxied response or `{ok: false, error}`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReply {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RelayReply {
    pub fn into_response(self) -> Result<FetchResponse, TransportError> {
        if let Some(error) = self.error {
            return Err(TransportError::Relay(error));
        }
        let status = self
            .status
            .ok_or_else(|| TransportError::Relay("reply carried no status".into()))?;
        Ok(
            FetchResponse::new(status, self.text.unwrap_or_default(), Route::Relay)
                .with_status_text(self.status_text.unwrap_or_default()),
        )
    }
}

/// Forwards requests through the relay endpoint. Longer timeout than the
/// direct path since the proxy adds a hop.
pub struct RelayTransport {
    http: reqwest::Client,
    relay_url: String,
    timeout: Duration,
}

impl RelayTransport {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, StartupError> {
        let http = http_client(timeout).map_err(|e| StartupError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            relay_url: relay_url.into(),
            timeout,
        })
    }
}

impl HttpTransport for RelayTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, TransportError>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.relay_url)
                .json(&RelayRequest::get(url))
                .send()
                .await
                .map_err(|e| request_error(e, self.timeout))?;
            if !resp.status().is_success() {
                return Err(TransportError::Relay(format!("relay status {}", resp.status())));
            }
            let reply: RelayReply = resp
                .json()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            reply.into_response()
        })
    }
}

/// Direct first; on any transport failure (timeout included) retry once
/// through the relay, if one is configured.
pub struct FallbackTransport {
    primary: Arc<dyn HttpTransport>,
    relay: Option<Arc<dyn HttpTransport>>,
}

impl FallbackTransport {
    pub fn new(primary: Arc<dyn HttpTransport>, relay: Option<Arc<dyn HttpTransport>>) -> Self {
        Self { primary, relay }
    }
}

impl HttpTransport for FallbackTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, TransportError>> {
        Box::pin(async move {
            match self.primary.get(url).await {
                Ok(resp) => Ok(resp),
                Err(e) => match &self.relay {
                    Some(relay) => {
                        warn!(error = %e, "direct fetch failed, falling back to relay");
                        relay.get(url).await
                    }
                    None => Err(e),
                },
            }
        })
    }
}

/// Build the transport stack described by `config`.
pub fn from_config(config: &Config) -> Result<Arc<dyn HttpTransport>, StartupError> {
    let direct: Arc<dyn HttpTransport> = Arc::new(DirectTransport::new(config.api_timeout)?);
    let relay = match &config.relay_url {
        Some(url) => Some(Arc::new(RelayTransport::new(url.clone(), config.relay_timeout)?)
            as Arc<dyn HttpTransport>),
        None => None,
    };
    Ok(Arc::new(FallbackTransport::new(direct, relay)))
}
