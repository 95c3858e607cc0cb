// Test upstream server for integration tests.

use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Upstream test server.
///
/// - `/ok` answers `200 text/plain` with body `ok`
/// - `/slow` answers the same after 500ms
/// - `/status/404` answers `404`
/// - anything else echoes the request line and headers as seen by the server
pub struct UpstreamServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
    shutdown: tokio::sync::oneshot::Sender<()>,
}

impl UpstreamServer {
    /// Starts the upstream server.
    pub async fn start() -> Self {
        let router = Router::new()
            .route("/ok", get(ok))
            .route("/slow", get(slow))
            .route("/status/404", get(|| async { (StatusCode::NOT_FOUND, "missing") }))
            .fallback(echo);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, router);
            tokio::select! {
                _ = server => {},
                _ = rx => {},
            }
        });

        Self {
            addr,
            handle,
            shutdown: tx,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, `http://127.0.0.1:<port>`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Closes the upstream server.
    pub async fn close(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn ok() -> impl IntoResponse {
    (
        [("content-type", "text/plain"), ("x-upstream", "axum")],
        "ok",
    )
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(500)).await;
    ok().await
}

async fn echo(req: Request) -> String {
    let mut out = format!("{} {}\n", req.method(), req.uri());
    for (name, value) in req.headers() {
        out.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("")));
    }
    out
}
