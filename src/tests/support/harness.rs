// Integration test harness: a real edge application on a loopback port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::{self, Config};
use crate::shutdown::GracefulShutdown;

/// Edge application under test.
pub struct EdgeServer {
    addr: SocketAddr,
    shutdown_token: CancellationToken,
    gsh: Arc<GracefulShutdown>,
}

impl EdgeServer {
    /// Starts the edge with the test config pointed at `upstream`, `host:port`.
    ///
    /// `tune` may adjust the config before the application is built.
    pub async fn start(upstream: &str, tune: impl FnOnce(&mut Config)) -> Self {
        let mut cfg = config::new_test_config();
        cfg.proxy.upstream.host = upstream.to_string();
        tune(&mut cfg);

        let shutdown_token = CancellationToken::new();
        let gsh = Arc::new(
            GracefulShutdown::new(shutdown_token.clone()).with_timeout(Duration::from_secs(5)),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = App::new(shutdown_token.clone(), cfg).unwrap();
        app.serve_listener(listener, gsh.clone()).unwrap();

        Self {
            addr,
            shutdown_token,
            gsh,
        }
    }

    /// Base URL, `http://127.0.0.1:<port>`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Cancels the application and waits for the server task to finish.
    pub async fn stop(self) {
        self.shutdown_token.cancel();
        self.gsh.await_shutdown().await.unwrap();
    }
}
