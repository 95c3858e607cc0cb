//! Upstream round trips.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::http::uri::Scheme;
use hyper::{Request, Response, Uri};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::http::client::{
    create_client, create_proxy_client, HyperClient, ProxyClient, CONNS_PER_HOST,
    MAX_IDLE_CONN_DURATION,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Streaming response body as handed back by a [`Transport`].
pub type UpstreamBody = UnsyncBoxBody<Bytes, BoxError>;

/// How a request reaches its upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    /// Through the http forward proxy at this URL.
    Proxy(Url),
}

impl Route {
    /// A proxy URL without a host means no proxy.
    pub fn from_proxy(proxy: Option<&Url>) -> Self {
        match proxy {
            Some(url) if url.host_str().is_some_and(|h| !h.is_empty()) => Self::Proxy(url.clone()),
            _ => Self::Direct,
        }
    }
}

/// Performs one upstream request and returns once the response head arrived.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(
        &self,
        request: Request<Bytes>,
        route: &Route,
    ) -> Result<Response<UpstreamBody>, BoxError>;

    /// Limit on reading a response body, if any.
    fn body_timeout(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Limit on getting the response head, connecting included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub body_timeout: Option<Duration>,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
            body_timeout: None,
            pool_idle_timeout: MAX_IDLE_CONN_DURATION,
            pool_max_idle_per_host: CONNS_PER_HOST,
        }
    }
}

/// [`Transport`] over pooled hyper clients, one per forward proxy plus a direct one.
pub struct HyperTransport {
    direct: HyperClient,
    proxied: DashMap<String, ProxyClient>,
    cfg: TransportConfig,
}

impl HyperTransport {
    pub fn new(cfg: TransportConfig) -> Self {
        Self {
            direct: create_client(&cfg),
            proxied: DashMap::new(),
            cfg,
        }
    }

    fn proxy_client(&self, proxy: &Url) -> Result<ProxyClient, BoxError> {
        if proxy.scheme() != "http" {
            return Err(format!("unsupported forward proxy scheme '{}'", proxy.scheme()).into());
        }
        let host = proxy.host_str().unwrap_or_default();
        let port = proxy.port_or_known_default().unwrap_or(80);
        let authority = format!("{}:{}", host, port);

        if let Some(client) = self.proxied.get(&authority) {
            return Ok(client.clone());
        }
        let uri: Uri = format!("http://{}", authority).parse()?;
        let client = self
            .proxied
            .entry(authority)
            .or_insert_with(|| create_proxy_client(uri, &self.cfg))
            .clone();
        Ok(client)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn round_trip(
        &self,
        request: Request<Bytes>,
        route: &Route,
    ) -> Result<Response<UpstreamBody>, BoxError> {
        let uri = request.uri().to_string();
        let request = request.map(Full::new);

        let pending = match route {
            Route::Direct => self.direct.request(request),
            Route::Proxy(proxy) => {
                if request.uri().scheme() != Some(&Scheme::HTTP) {
                    return Err(format!("cannot send {} through forward proxy {}", uri, proxy).into());
                }
                self.proxy_client(proxy)?.request(request)
            }
        };

        match timeout(self.cfg.timeout, pending).await {
            Ok(Ok(response)) => Ok(response.map(|body| body.map_err(BoxError::from).boxed_unsync())),
            Ok(Err(e)) => {
                tracing::error!(
                    component = "upstream",
                    event = "request_failed",
                    uri = %uri,
                    error = %e,
                    error_debug = ?e,
                    "hyper client request failed"
                );
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    component = "upstream",
                    event = "request_timeout",
                    uri = %uri,
                    timeout = ?self.cfg.timeout,
                    "request timed out"
                );
                Err(format!("request timed out after {:?} (URI: {})", self.cfg.timeout, uri).into())
            }
        }
    }

    fn body_timeout(&self) -> Option<Duration> {
        self.cfg.body_timeout
    }
}
