//! HTTP server implementation.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::ForwardPipeline;
use crate::http::accounting::CountingConn;
use crate::http::server::parse::{read_request, Limits, ReadError};
use crate::http::writer::{serve_req_err, stage_close, Http1ResponseWriter, ResponseSink};
use crate::metrics;

/// Accept loop feeding client connections into a [`ForwardPipeline`].
pub struct Server {
    shutdown_token: CancellationToken,
    pipeline: Arc<ForwardPipeline>,
    limits: Limits,
}

impl Server {
    pub fn new(
        shutdown_token: CancellationToken,
        pipeline: Arc<ForwardPipeline>,
        limits: Limits,
    ) -> Self {
        Self {
            shutdown_token,
            pipeline,
            limits,
        }
    }

    /// Serves connections from `listener` until the shutdown token is cancelled.
    ///
    /// Connections already open finish their current request and close.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .context("failed to read listener address")?;
        info!(component = "server", event = "started", addr = %local, "server started");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let pipeline = self.pipeline.clone();
                        let limits = self.limits.clone();
                        let shutdown = self.shutdown_token.child_token();
                        tokio::spawn(serve_conn(stream, peer, pipeline, limits, shutdown));
                    }
                    Err(e) => {
                        error!(component = "server", event = "accept_failed", error = %e, "failed to accept connection");
                    }
                },
            }
        }

        info!(component = "server", event = "stopped", addr = %local, "server stopped");
        Ok(())
    }
}

/// Serves keep-alive requests on one connection, sequentially.
async fn serve_conn(
    stream: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<ForwardPipeline>,
    limits: Limits,
    shutdown: CancellationToken,
) {
    let remote_addr = peer.to_string();
    if let Err(e) = stream.set_nodelay(true) {
        debug!(component = "server", event = "nodelay_failed", peer = %remote_addr, error = %e, "cannot set TCP_NODELAY");
    }

    let conn = CountingConn::new(stream);
    let counter = conn.counter();
    let (rd, mut wr) = tokio::io::split(conn);
    let mut rd = BufReader::new(rd);

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = timeout(limits.idle_timeout, read_request(&mut rd, &remote_addr, &limits)) => read,
        };

        let req = match next {
            Err(_) => {
                debug!(component = "server", event = "idle_timeout", peer = %remote_addr, "closing idle connection");
                break;
            }
            Ok(Ok(None)) => break,
            Ok(Ok(Some(req))) => req,
            Ok(Err(ReadError::Io(e))) => {
                debug!(component = "server", event = "read_failed", peer = %remote_addr, error = %e, "reading request failed");
                break;
            }
            Ok(Err(e)) => {
                warn!(component = "server", event = "bad_request", peer = %remote_addr, error = %e, "rejecting request");
                let mut writer = Http1ResponseWriter::new(&mut wr);
                stage_close(writer.headers_mut());
                if serve_req_err(&mut writer).await.is_ok() {
                    let _ = writer.finish().await;
                }
                break;
            }
        };

        let keep_alive = req.wants_keep_alive();
        let mut writer = Http1ResponseWriter::new(&mut wr)
            .head_only(req.is_head())
            .for_version(req.version);
        if !keep_alive {
            stage_close(writer.headers_mut());
        }

        let record = pipeline.handle(&req, &mut writer, Some(&counter)).await;
        let finished = writer.finish().await;

        if !keep_alive || writer.closes_connection() || record.write_error.is_some() || finished.is_err() {
            break;
        }
    }

    let _ = wr.shutdown().await;
    metrics::add_bytes_written(counter.get());
}
