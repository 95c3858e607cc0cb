// Forwarding pipeline: one client request in, one client response out.

use bytes::Bytes;
use hyper::{Request, Uri};
use std::sync::Arc;
use tracing::{info, warn, Span};
use url::Url;

use crate::http::accounting::{reconcile_bytes_written, ConnBytes};
use crate::http::addr::{resolve_client_address, ClientAddress};
use crate::http::header::ModHeaders;
use crate::http::request::ClientRequest;
use crate::http::writer::{respond, serve_req_err, stage_close, ResponseSink, WriteError};
use crate::metrics;
use crate::upstream::sanitize::strip_hop_by_hop;
use crate::upstream::{forward, Timing, Transport, UpstreamError};

/// Shared-data key for remap rule text; carried into the record, never interpreted.
pub const REMAP_TEXT_KEY: &str = "remap_text";

/// Outcome of one transaction as handed to stats and logging.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    /// Status sent to the client.
    pub status: u16,
    pub bytes_written: u64,
    /// `None` when the upstream was never contacted.
    pub timing: Option<Timing>,
    pub client: ClientAddress,
    pub upstream_error: Option<String>,
    pub write_error: Option<String>,
    pub remap_text: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum BuildError {
    #[error("request target '{0}' is not in origin-form")]
    NotOriginForm(String),
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
}

/// Forwards client requests to one upstream base.
pub struct ForwardPipeline {
    target: Uri,
    forward_proxy: Option<Url>,
    ingress: Arc<ModHeaders>,
    egress: Arc<ModHeaders>,
    transport: Arc<dyn Transport>,
    force_close: bool,
    span: Span,
}

impl ForwardPipeline {
    /// `target` is the upstream base, `scheme://authority`; request targets are appended to it.
    pub fn new(target: Uri, transport: Arc<dyn Transport>) -> Self {
        Self {
            target,
            forward_proxy: None,
            ingress: Arc::new(ModHeaders::default()),
            egress: Arc::new(ModHeaders::default()),
            transport,
            force_close: false,
            span: Span::none(),
        }
    }

    pub fn with_forward_proxy(mut self, proxy: Option<Url>) -> Self {
        self.forward_proxy = proxy;
        self
    }

    pub fn with_rules(mut self, ingress: Arc<ModHeaders>, egress: Arc<ModHeaders>) -> Self {
        self.ingress = ingress;
        self.egress = egress;
        self
    }

    pub fn with_force_close(mut self, force_close: bool) -> Self {
        self.force_close = force_close;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Runs one transaction: ingress rules, upstream round trip, egress rules,
    /// client response and byte reconciliation, in that order.
    pub async fn handle<S>(
        &self,
        req: &ClientRequest,
        sink: &mut S,
        conn: Option<&dyn ConnBytes>,
    ) -> TransactionRecord
    where
        S: ResponseSink + ?Sized,
    {
        let client = resolve_client_address(req);
        let span = tracing::debug_span!(
            parent: &self.span,
            "transaction",
            client_ip = %client.ip,
            method = %req.method,
            target = %req.target,
        );

        let mut record = TransactionRecord {
            status: 0,
            bytes_written: 0,
            timing: None,
            client,
            upstream_error: None,
            write_error: None,
            remap_text: req.plugin_data.get(REMAP_TEXT_KEY).cloned(),
        };

        let written = match self.outbound_request(req, &span) {
            Ok(outbound) => {
                match forward(
                    self.transport.as_ref(),
                    outbound,
                    self.forward_proxy.as_ref(),
                    &span,
                )
                .await
                {
                    Ok(mut fwd) => {
                        record.timing = Some(fwd.timing);
                        record.status = fwd.status;
                        metrics::observe_upstream_latency(fwd.timing.latency());

                        if self.egress.has_any() {
                            self.egress.apply(&mut fwd.headers, &span);
                        }
                        respond(sink, fwd.status, &fwd.headers, &fwd.body, self.force_close).await
                    }
                    Err(err) => {
                        record.timing = Some(err.timing());
                        record.upstream_error = Some(err.to_string());
                        metrics::inc_upstream_errors(match err {
                            UpstreamError::Request { .. } => "request",
                            UpstreamError::BodyRead { .. } => "body_read",
                        });
                        warn!(parent: &span, component = "forward", event = "upstream_failed", error = %err, "upstream request failed");
                        self.answer_bad_request(sink, &mut record).await
                    }
                }
            }
            Err(err) => {
                warn!(parent: &span, component = "forward", event = "bad_request", error = %err, "cannot build upstream request");
                self.answer_bad_request(sink, &mut record).await
            }
        };

        // Framing must be complete before the connection counter is read.
        let written = match written {
            Ok(n) => sink.complete().await.map(|()| n).map_err(|e| WriteError::new(n, e)),
            Err(err) => Err(err),
        };

        let reported = match written {
            Ok(n) => n,
            Err(err) => {
                metrics::inc_write_errors();
                warn!(parent: &span, component = "forward", event = "write_failed", error = %err, "writing client response failed");
                record.write_error = Some(err.to_string());
                err.bytes_written
            }
        };
        record.bytes_written = reconcile_bytes_written(sink, conn, reported, &span).await;

        metrics::inc_requests(record.status);
        info!(
            parent: &span,
            component = "forward",
            event = "transaction",
            status = record.status,
            bytes_written = record.bytes_written,
            latency = ?record.timing.map(|t| t.latency()),
            client_port = %record.client.port,
            remap_text = record.remap_text.as_deref(),
            upstream_error = record.upstream_error.as_deref(),
            "transaction done"
        );

        record
    }

    async fn answer_bad_request<S>(
        &self,
        sink: &mut S,
        record: &mut TransactionRecord,
    ) -> Result<u64, WriteError>
    where
        S: ResponseSink + ?Sized,
    {
        if self.force_close {
            stage_close(sink.headers_mut());
        }
        record.status = 400;
        let (code, n) = serve_req_err(sink).await?;
        record.status = code;
        Ok(n)
    }

    /// Builds the upstream request: hop-by-hop headers stripped, ingress rules applied.
    fn outbound_request(&self, req: &ClientRequest, log: &Span) -> Result<Request<Bytes>, BuildError> {
        if !req.target.starts_with('/') {
            return Err(BuildError::NotOriginForm(req.target.clone()));
        }

        let mut headers = req.headers.clone();
        strip_hop_by_hop(&mut headers);
        if self.ingress.has_any() {
            self.ingress.apply(&mut headers, log);
        }

        let base = self.target.to_string();
        let uri = format!("{}{}", base.trim_end_matches('/'), req.target);

        let mut builder = Request::builder().method(req.method.as_str()).uri(uri);
        if let Some(map) = builder.headers_mut() {
            *map = headers.to_header_map();
        }
        Ok(builder.body(req.body.clone())?)
    }
}
