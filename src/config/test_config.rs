use super::{Config, Edge, Logs, ProxyBox, Remap, Upstream};
use std::time::Duration;

/// Creates a new test configuration.
pub fn new_test_config() -> Config {
    Edge {
        proxy: ProxyBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            listen: Some("127.0.0.1:0".to_string()),
            client_idle_timeout: Some(Duration::from_secs(5)),
            upstream: Upstream {
                scheme: Some("http".to_string()),
                host: "localhost:8090".to_string(),
                forward_proxy: None,
                timeout: Some(Duration::from_secs(5)),
                connect_timeout: Some(Duration::from_secs(1)),
                body_timeout: Some(Duration::from_secs(5)),
                idle_timeout: Some(Duration::from_secs(30)),
                max_idle_per_host: Some(64),
            },
            remap: Remap::default(),
            metrics: None,
        },
    }
}
