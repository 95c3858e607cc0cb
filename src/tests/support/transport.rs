// In-process upstream transport for pipeline tests.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::{HeaderMap, Request, Response};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crate::upstream::{BoxError, Route, Transport, UpstreamBody};

/// What the fake upstream answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: Bytes,
    },
    /// Connection refused before any response.
    Refused,
    /// Head arrives, the body breaks after `prefix`.
    Truncated { status: u16, prefix: Bytes },
}

impl Reply {
    pub fn ok(status: u16, headers: Vec<(&'static str, &'static str)>, body: &'static str) -> Self {
        Self::Ok {
            status,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }
}

/// A request as the transport received it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub route: Route,
}

pub struct FakeTransport {
    reply: Reply,
    delay: Duration,
    seen: Mutex<Vec<Seen>>,
}

impl FakeTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn round_trip(
        &self,
        request: Request<Bytes>,
        route: &Route,
    ) -> Result<Response<UpstreamBody>, BoxError> {
        let (parts, body) = request.into_parts();
        self.seen.lock().unwrap().push(Seen {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
            route: route.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.reply {
            Reply::Ok {
                status,
                headers,
                body,
            } => {
                let mut builder = Response::builder().status(*status);
                for (name, value) in headers {
                    builder = builder.header(*name, *value);
                }
                let body: UpstreamBody = Full::new(body.clone())
                    .map_err(|never| match never {})
                    .boxed_unsync();
                Ok(builder.body(body)?)
            }
            Reply::Refused => Err(io::Error::from(io::ErrorKind::ConnectionRefused).into()),
            Reply::Truncated { status, prefix } => {
                let frames: Vec<Result<Frame<Bytes>, BoxError>> = vec![
                    Ok(Frame::data(prefix.clone())),
                    Err(io::Error::from(io::ErrorKind::ConnectionReset).into()),
                ];
                let body = StreamBody::new(futures::stream::iter(frames)).boxed_unsync();
                Ok(Response::builder().status(*status).body(body)?)
            }
        }
    }
}
