//! Request head and body reading.

use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::request::ClientRequest;

pub const MAX_HEADERS: usize = 100;

/// Per-connection read limits.
#[derive(Debug, Clone)]
pub struct Limits {
    /// How long a connection may sit between requests.
    pub idle_timeout: Duration,
    pub max_head_size: usize,
    pub max_body_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            max_head_size: 64 << 10,
            max_body_size: 16 << 20,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed request head: {0}")]
    Malformed(#[from] httparse::Error),
    #[error("request head ended early")]
    Incomplete,
    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("invalid content-length '{0}'")]
    InvalidContentLength(String),
    #[error("request transfer-encoding '{0}' is not supported")]
    UnsupportedTransferEncoding(String),
}

/// Reads the next request from a connection.
///
/// Returns `Ok(None)` on a clean end of stream between requests. The body is
/// read by `Content-Length`; chunked request bodies are refused.
pub async fn read_request<R>(
    rd: &mut R,
    remote_addr: &str,
    limits: &Limits,
) -> Result<Option<ClientRequest>, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    loop {
        let room = (limits.max_head_size + 1).saturating_sub(head.len()) as u64;
        let n = (&mut *rd).take(room).read_until(b'\n', &mut head).await?;
        if n == 0 {
            if head.is_empty() {
                return Ok(None);
            }
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        if head.len() > limits.max_head_size {
            return Err(ReadError::HeadTooLarge(limits.max_head_size));
        }
        // Empty lines before the request line are ignored.
        if head == b"\r\n" || head == b"\n" {
            head.clear();
            continue;
        }
        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            break;
        }
    }

    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut slots);
    if parsed.parse(&head)?.is_partial() {
        return Err(ReadError::Incomplete);
    }

    let mut req = ClientRequest::new(
        parsed.method.unwrap_or_default(),
        parsed.path.unwrap_or_default(),
        remote_addr,
    );
    req.version = parsed.version.unwrap_or(1);
    for h in parsed.headers.iter() {
        req.headers.add(h.name, &String::from_utf8_lossy(h.value));
    }

    if let Some(te) = req.headers.get("Transfer-Encoding") {
        return Err(ReadError::UnsupportedTransferEncoding(te.to_string()));
    }

    let len = content_length(&req)?;
    if len > limits.max_body_size {
        return Err(ReadError::BodyTooLarge(limits.max_body_size));
    }
    if len > 0 {
        let mut body = vec![0u8; len];
        rd.read_exact(&mut body).await?;
        req.body = Bytes::from(body);
    }

    Ok(Some(req))
}

/// All `Content-Length` values must agree.
fn content_length(req: &ClientRequest) -> Result<usize, ReadError> {
    let mut found: Option<usize> = None;
    for raw in req.headers.get_all("Content-Length") {
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ReadError::InvalidContentLength(raw.clone()));
            }
            let n = part
                .parse::<usize>()
                .map_err(|_| ReadError::InvalidContentLength(raw.clone()))?;
            if found.is_some_and(|prev| prev != n) {
                return Err(ReadError::InvalidContentLength(raw.clone()));
            }
            found = Some(n);
        }
    }
    Ok(found.unwrap_or(0))
}
