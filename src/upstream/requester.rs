//! Forwarding one request to the upstream and reading the full response.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::Request;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{debug, Span};
use url::Url;

use crate::http::header::HeaderCollection;
use crate::upstream::error::UpstreamError;
use crate::upstream::sanitize::strip_hop_by_hop;
use crate::upstream::transport::{BoxError, Route, Transport};

/// When the upstream request started and when its response head arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub request_started_at: SystemTime,
    pub response_received_at: SystemTime,
}

impl Timing {
    /// Closes a measurement started at `started`. The end is never earlier than the start.
    pub fn since(started: SystemTime) -> Self {
        Self {
            request_started_at: started,
            response_received_at: SystemTime::now().max(started),
        }
    }

    pub fn latency(&self) -> Duration {
        self.response_received_at
            .duration_since(self.request_started_at)
            .unwrap_or_default()
    }
}

/// A fully read upstream response.
#[derive(Debug, Clone)]
pub struct Forwarded {
    pub status: u16,
    /// Response headers without hop-by-hop entries.
    pub headers: HeaderCollection,
    pub body: Bytes,
    pub timing: Timing,
}

/// Sends `request` to its upstream, through `forward_proxy` when that has a
/// host, and reads the whole response body.
///
/// The timing marks the request start and the arrival of the response head;
/// body reading is not part of it.
pub async fn forward(
    transport: &dyn Transport,
    request: Request<Bytes>,
    forward_proxy: Option<&Url>,
    log: &Span,
) -> Result<Forwarded, UpstreamError> {
    let route = Route::from_proxy(forward_proxy);
    debug!(
        parent: log,
        component = "upstream",
        event = "forward",
        method = %request.method(),
        uri = %request.uri(),
        proxy = ?forward_proxy.map(Url::as_str),
        headers = ?request.headers(),
        "requesting upstream"
    );

    let started = SystemTime::now();
    let result = transport.round_trip(request, &route).await;
    let timing = Timing::since(started);
    let response = result.map_err(|source| UpstreamError::Request { source, timing })?;

    let (parts, body) = response.into_parts();
    let status = parts.status.as_u16();

    let collected = match transport.body_timeout() {
        Some(limit) => match timeout(limit, body.collect()).await {
            Ok(collected) => collected,
            Err(_) => Err(BoxError::from(format!("body read timed out after {:?}", limit))),
        },
        None => body.collect().await,
    };
    let body = collected
        .map_err(|source| UpstreamError::BodyRead {
            status,
            source,
            timing,
        })?
        .to_bytes();

    let mut headers = HeaderCollection::from_header_map(&parts.headers);
    strip_hop_by_hop(&mut headers);

    debug!(
        parent: log,
        component = "upstream",
        event = "response",
        status,
        body_len = body.len(),
        latency = ?timing.latency(),
        "upstream responded"
    );

    Ok(Forwarded {
        status,
        headers,
        body,
        timing,
    })
}
