//! Hyper HTTP clients for upstream requests.
//!
//! Pool settings:
//! - Max idle connections per host: 2048 unless configured
//! - Max idle connection duration: 30s unless configured
//! - TCP keep-alive: 30s
//! - TCP_NODELAY: enabled
//! - Retry canceled requests: enabled
//!
//! Proxied clients dial the forward proxy for every destination and mark the
//! connection as proxied, so requests go out in absolute-form.

use bytes::Bytes;
use http_body_util::Full;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::dns::GaiResolver;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;
use tracing::warn;

use crate::upstream::{BoxError, TransportConfig};

pub const CONNS_PER_HOST: usize = 2048;
pub const MAX_IDLE_CONN_DURATION: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

pub type HyperClient = Client<HttpsConnector<HttpConnector<GaiResolver>>, Full<Bytes>>;
pub type ProxyClient = Client<ProxyConnector, Full<Bytes>>;

fn http_connector(cfg: &TransportConfig) -> HttpConnector<GaiResolver> {
    let mut http = HttpConnector::new_with_resolver(GaiResolver::new());
    http.set_nodelay(true);
    http.set_keepalive(Some(TCP_KEEPALIVE));
    http.set_connect_timeout(Some(cfg.connect_timeout));
    http
}

fn client_builder(cfg: &TransportConfig) -> hyper_util::client::legacy::Builder {
    let mut builder = Client::builder(TokioExecutor::new());
    builder
        .pool_idle_timeout(cfg.pool_idle_timeout)
        .pool_max_idle_per_host(cfg.pool_max_idle_per_host)
        .http1_title_case_headers(false)
        .http1_allow_obsolete_multiline_headers_in_responses(true)
        .retry_canceled_requests(true);
    builder
}

/// Creates the client for direct upstream requests over http or https.
///
/// Trusts the platform root certificates, or the bundled webpki roots when the
/// platform has none.
pub fn create_client(cfg: &TransportConfig) -> HyperClient {
    let mut http = http_connector(cfg);
    http.enforce_http(false);

    let roots = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(err) => {
            warn!(component = "client", event = "native_roots_unavailable", error = %err, "falling back to bundled root certificates");
            HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };

    // HTTP/1.1 only, so Host is always sent as a header.
    let tls = roots.https_or_http().enable_http1().wrap_connector(http);

    client_builder(cfg).build(tls)
}

/// Creates a client that sends every request through the http proxy at `proxy`.
pub fn create_proxy_client(proxy: Uri, cfg: &TransportConfig) -> ProxyClient {
    let connector = ProxyConnector {
        proxy,
        http: http_connector(cfg),
    };
    client_builder(cfg).build(connector)
}

/// Connects to a fixed forward proxy regardless of the requested destination.
#[derive(Clone)]
pub struct ProxyConnector {
    proxy: Uri,
    http: HttpConnector<GaiResolver>,
}

impl Service<Uri> for ProxyConnector {
    type Response = Proxied<<HttpConnector<GaiResolver> as Service<Uri>>::Response>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.http.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, _dst: Uri) -> Self::Future {
        let connecting = self.http.call(self.proxy.clone());
        Box::pin(async move { Ok(Proxied(connecting.await?)) })
    }
}

/// Connection to a forward proxy.
pub struct Proxied<T>(T);

impl<T: Connection> Connection for Proxied<T> {
    fn connected(&self) -> Connected {
        self.0.connected().proxy(true)
    }
}

impl<T: Read + Unpin> Read for Proxied<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl<T: Write + Unpin> Write for Proxied<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}
