//! Client response writing.
//!
//! The pipeline never touches the socket directly: it stages headers on a
//! [`ResponseSink`], commits a status and hands over the body. Sinks that can
//! push buffered bytes on demand expose it through [`ResponseSink::flusher`].

use async_trait::async_trait;
use hyper::StatusCode;
use std::io;
use std::time::SystemTime;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, Span};

use crate::http::date::format_http_date;
use crate::http::header::HeaderCollection;

const DEFAULT_WRITE_BUFFER: usize = 4096;

/// Writing the response to the client failed.
///
/// `bytes_written` is what the sink reported before failing, which may be less
/// than what actually reached the socket.
#[derive(Debug, thiserror::Error)]
#[error("writing response to client: {source}")]
pub struct WriteError {
    pub bytes_written: u64,
    pub source: io::Error,
}

impl WriteError {
    pub fn new(bytes_written: u64, source: io::Error) -> Self {
        Self {
            bytes_written,
            source,
        }
    }
}

/// Destination of a client response.
#[async_trait]
pub trait ResponseSink: Send {
    /// Headers staged for the response. Changes made after `write_status` are not sent.
    fn headers_mut(&mut self) -> &mut HeaderCollection;

    /// Commits the status line and the staged headers. Only the first call has effect.
    async fn write_status(&mut self, code: u16) -> io::Result<()>;

    /// Writes body bytes, committing a `200` first if no status was written.
    async fn write(&mut self, body: &[u8]) -> io::Result<usize>;

    /// Flush capability, if the sink has one.
    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        None
    }

    /// Completes the message framing once the whole body was written.
    async fn complete(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Flush: Send {
    async fn flush(&mut self) -> io::Result<()>;
}

/// Whether `headers` carry a `close` connection option.
pub fn has_close_token(headers: &HeaderCollection) -> bool {
    headers
        .get_all("Connection")
        .iter()
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case("close"))
}

/// Stages `Connection: close` unless a `close` option is already staged.
pub fn stage_close(headers: &mut HeaderCollection) {
    if !has_close_token(headers) {
        headers.add("Connection", "close");
    }
}

fn status_allows_body(code: u16) -> bool {
    !(code < 200 || code == 204 || code == 304)
}

/// Copies `headers` into the sink, then writes the status and body.
///
/// The body is complete, so a missing `Content-Length` is staged from its size
/// unless the message is already framed otherwise. With `force_close` a
/// `Connection: close` is staged. Returns the body byte count reported by the
/// sink.
pub async fn respond<S>(
    sink: &mut S,
    code: u16,
    headers: &HeaderCollection,
    body: &[u8],
    force_close: bool,
) -> Result<u64, WriteError>
where
    S: ResponseSink + ?Sized,
{
    let staged = sink.headers_mut();
    headers.copy_to(staged);
    if force_close {
        stage_close(staged);
    }
    if status_allows_body(code)
        && !body.is_empty()
        && !staged.contains("Content-Length")
        && !staged.contains("Transfer-Encoding")
    {
        staged.set("Content-Length", &body.len().to_string());
    }

    sink.write_status(code)
        .await
        .map_err(|e| WriteError::new(0, e))?;
    let n = sink.write(body).await.map_err(|e| WriteError::new(0, e))?;
    Ok(n as u64)
}

/// Writes `code` with its canonical reason phrase as a plain-text body.
pub async fn serve_err<S>(sink: &mut S, code: u16) -> Result<u64, WriteError>
where
    S: ResponseSink + ?Sized,
{
    let text = reason_phrase(code);
    let staged = sink.headers_mut();
    if !staged.contains("Content-Type") {
        staged.set("Content-Type", "text/plain; charset=utf-8");
    }
    staged.set("Content-Length", &text.len().to_string());

    sink.write_status(code)
        .await
        .map_err(|e| WriteError::new(0, e))?;
    let n = sink
        .write(text.as_bytes())
        .await
        .map_err(|e| WriteError::new(0, e))?;
    Ok(n as u64)
}

/// Answers `400 Bad Request`. Returns the status actually used.
pub async fn serve_req_err<S>(sink: &mut S) -> Result<(u16, u64), WriteError>
where
    S: ResponseSink + ?Sized,
{
    let code = StatusCode::BAD_REQUEST.as_u16();
    let n = serve_err(sink, code).await?;
    Ok((code, n))
}

/// Flushes the sink if it supports flushing. Non-flushable sinks are a no-op.
pub async fn try_flush<S>(sink: &mut S) -> io::Result<()>
where
    S: ResponseSink + ?Sized,
{
    match sink.flusher() {
        Some(f) => f.flush().await,
        None => Ok(()),
    }
}

pub fn reason_phrase(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// HTTP/1.1 response writer over a buffered byte stream.
///
/// Without a `Content-Length` the body is sent with chunked framing; `finish`
/// writes the terminating chunk and flushes. HTTP/1.0 clients cannot read
/// chunked bodies, so for them the body is delimited by closing the connection.
pub struct Http1ResponseWriter<W> {
    out: BufWriter<W>,
    headers: HeaderCollection,
    status: Option<u16>,
    head_sent: bool,
    chunked: bool,
    head_only: bool,
    http10: bool,
    span: Span,
}

impl<W> Http1ResponseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(inner: W) -> Self {
        Self::with_capacity(DEFAULT_WRITE_BUFFER, inner)
    }

    pub fn with_capacity(capacity: usize, inner: W) -> Self {
        Self {
            out: BufWriter::with_capacity(capacity, inner),
            headers: HeaderCollection::new(),
            status: None,
            head_sent: false,
            chunked: false,
            head_only: false,
            http10: false,
            span: Span::current(),
        }
    }

    /// Responses to `HEAD` carry headers only; body writes are discarded.
    pub fn head_only(mut self, yes: bool) -> Self {
        self.head_only = yes;
        self
    }

    /// Sets the minor HTTP/1 version of the request being answered.
    pub fn for_version(mut self, minor: u8) -> Self {
        self.http10 = minor == 0;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Whether the committed response told the client the connection closes.
    pub fn closes_connection(&self) -> bool {
        has_close_token(&self.headers)
    }

    /// Commits the head if needed, terminates chunked framing and flushes.
    pub async fn finish(&mut self) -> io::Result<()> {
        if !self.head_sent {
            self.send_head().await?;
        }
        if self.chunked {
            self.chunked = false;
            self.out.write_all(b"0\r\n\r\n").await?;
        }
        self.out.flush().await
    }

    fn body_allowed(&self) -> bool {
        self.status.map_or(true, status_allows_body)
    }

    async fn send_head(&mut self) -> io::Result<()> {
        let code = *self.status.get_or_insert(200);

        if !self.headers.contains("Date") {
            self.headers.set("Date", &format_http_date(SystemTime::now()));
        }
        if self.body_allowed()
            && !self.head_only
            && !self.headers.contains("Content-Length")
            && !self.headers.contains("Transfer-Encoding")
        {
            if self.http10 {
                stage_close(&mut self.headers);
            } else {
                self.headers.set("Transfer-Encoding", "chunked");
                self.chunked = true;
            }
        }

        let mut head = String::with_capacity(256);
        head.push_str(&format!("HTTP/1.1 {} {}\r\n", code, reason_phrase(code)));
        for (name, value) in self.headers.pairs() {
            if value.contains(['\r', '\n']) {
                debug!(parent: &self.span, component = "writer", event = "header_skipped", header = name, "header value contains a line break");
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        self.head_sent = true;
        self.out.write_all(head.as_bytes()).await
    }
}

#[async_trait]
impl<W> ResponseSink for Http1ResponseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn headers_mut(&mut self) -> &mut HeaderCollection {
        &mut self.headers
    }

    async fn write_status(&mut self, code: u16) -> io::Result<()> {
        if self.head_sent || self.status.is_some() {
            debug!(parent: &self.span, component = "writer", event = "superfluous_status", code, "status already written");
            return Ok(());
        }
        self.status = Some(code);
        self.send_head().await
    }

    async fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        if !self.head_sent {
            self.send_head().await?;
        }
        if !self.body_allowed() && !body.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "response status does not allow a body",
            ));
        }
        if self.head_only || body.is_empty() {
            return Ok(body.len());
        }

        if self.chunked {
            self.out
                .write_all(format!("{:x}\r\n", body.len()).as_bytes())
                .await?;
            self.out.write_all(body).await?;
            self.out.write_all(b"\r\n").await?;
        } else {
            self.out.write_all(body).await?;
        }
        Ok(body.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }

    async fn complete(&mut self) -> io::Result<()> {
        self.finish().await
    }
}

#[async_trait]
impl<W> Flush for Http1ResponseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn flush(&mut self) -> io::Result<()> {
        if !self.head_sent {
            self.send_head().await?;
        }
        self.out.flush().await
    }
}
