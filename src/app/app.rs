// Main edge application implementation.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::controller::ForwardPipeline;
use crate::http::server::Server;
use crate::shutdown::GracefulShutdown;
use crate::upstream::{HyperTransport, Transport};

/// Encapsulates the entire edge application state.
#[derive(Clone)]
pub struct App {
    cfg: Config,
    shutdown_token: CancellationToken,
    server: Arc<Server>,
}

impl App {
    /// Creates the application with the hyper transport.
    pub fn new(shutdown_token: CancellationToken, cfg: Config) -> Result<Self> {
        let transport = Arc::new(HyperTransport::new(cfg.transport()));
        Self::with_transport(shutdown_token, cfg, transport)
    }

    /// Creates the application over an arbitrary upstream transport.
    pub fn with_transport(
        shutdown_token: CancellationToken,
        cfg: Config,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let target = cfg.target().context("upstream target")?;
        let forward_proxy = cfg.forward_proxy().context("upstream forward proxy")?;
        let remap = cfg.remap();

        let pipeline = ForwardPipeline::new(target, transport)
            .with_forward_proxy(forward_proxy)
            .with_rules(Arc::new(remap.ingress.clone()), Arc::new(remap.egress.clone()))
            .with_force_close(remap.force_close)
            .with_span(tracing::info_span!("edge", env = %cfg.proxy.env));

        let server = Arc::new(Server::new(
            shutdown_token.clone(),
            Arc::new(pipeline),
            cfg.limits(),
        ));

        Ok(Self {
            cfg,
            shutdown_token,
            server,
        })
    }

    /// Binds the configured listener and starts serving in the background.
    pub async fn serve(&self, gsh: Arc<GracefulShutdown>) -> Result<()> {
        let listener = TcpListener::bind(self.cfg.listen())
            .await
            .with_context(|| format!("failed to bind TCP listener on {}", self.cfg.listen()))?;
        self.serve_listener(listener, gsh)
    }

    /// Starts serving `listener` in the background; `gsh` is marked done once the server stops.
    pub fn serve_listener(&self, listener: TcpListener, gsh: Arc<GracefulShutdown>) -> Result<()> {
        let local = listener
            .local_addr()
            .context("failed to read listener address")?;
        let server = self.server.clone();
        let shutdown_token = self.shutdown_token.clone();

        gsh.add(1);
        tokio::task::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "server failed to serve"
                );
                shutdown_token.cancel();
            }
            gsh.done();
        });

        info!(
            component = "app",
            event = "started",
            listen = %local,
            upstream = %self.cfg.upstream().host,
            "application lifecycle"
        );

        Ok(())
    }
}
