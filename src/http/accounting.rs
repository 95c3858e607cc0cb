//! Per-connection byte accounting.
//!
//! The count a response sink reports is the number of body bytes handed to it,
//! which says nothing about what reached the client. [`CountingConn`] counts
//! bytes accepted by the socket instead, and [`reconcile_bytes_written`] flushes
//! the sink before reading that counter.

use std::io::IoSlice;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{error, warn, Span};

use crate::http::writer::ResponseSink;

/// Shared cumulative counter of bytes written to one connection.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Connection that knows how many bytes it has written since it was opened.
pub trait ConnBytes: Send + Sync {
    fn bytes_written(&self) -> u64;
}

impl ConnBytes for ByteCounter {
    fn bytes_written(&self) -> u64 {
        self.get()
    }
}

/// Stream wrapper counting every byte the inner stream accepted for writing.
#[derive(Debug)]
pub struct CountingConn<S> {
    inner: S,
    written: ByteCounter,
}

impl<S> CountingConn<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            written: ByteCounter::new(),
        }
    }

    /// Handle to the counter, usable after the stream is split or moved.
    pub fn counter(&self) -> ByteCounter {
        self.written.clone()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> ConnBytes for CountingConn<S>
where
    S: Send + Sync,
{
    fn bytes_written(&self) -> u64 {
        self.written.get()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CountingConn<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CountingConn<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let polled = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &polled {
            self.written.add(*n as u64);
        }
        polled
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<std::io::Result<usize>> {
        let polled = Pin::new(&mut self.inner).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(n)) = &polled {
            self.written.add(*n as u64);
        }
        polled
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Returns the number of bytes to record for a transaction.
///
/// The sink is flushed first so buffered bytes reach the connection counter.
/// With a counting connection its cumulative figure wins, otherwise `reported`
/// is returned unchanged. The counter covers the whole connection, so on a
/// reused connection the figure includes earlier transactions.
pub async fn reconcile_bytes_written<S>(
    sink: &mut S,
    conn: Option<&dyn ConnBytes>,
    reported: u64,
    log: &Span,
) -> u64
where
    S: ResponseSink + ?Sized,
{
    match sink.flusher() {
        Some(f) => {
            if let Err(err) = f.flush().await {
                warn!(parent: log, component = "accounting", event = "flush_failed", error = %err, "flushing response before byte accounting");
            }
        }
        None => {
            error!(parent: log, component = "accounting", event = "flush_unsupported", "response sink is not flushable, written bytes stat will be inaccurate");
        }
    }

    match conn {
        Some(c) => c.bytes_written(),
        None => reported,
    }
}
