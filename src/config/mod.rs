// Configuration loading and management.

use anyhow::{Context, Result};
use hyper::Uri;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::http::header::ModHeaders;
use crate::http::server::Limits;
use crate::upstream::TransportConfig;

pub const PROD: &str = "prod";
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_SCHEME: &str = "http";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Edge {
    #[serde(rename = "proxy")]
    pub proxy: ProxyBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyBox {
    pub env: String,
    pub logs: Option<Logs>,
    /// Client listener address, `host:port`.
    pub listen: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub client_idle_timeout: Option<Duration>,
    pub upstream: Upstream,
    #[serde(default)]
    pub remap: Remap,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Upstream {
    pub scheme: Option<String>,
    pub host: String,
    /// Http forward proxy URL. A URL without a host disables it.
    pub forward_proxy: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub body_timeout: Option<Duration>,
    /// How long pooled upstream connections may stay idle.
    #[serde(default, with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
    pub max_idle_per_host: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Remap {
    #[serde(default)]
    pub ingress: ModHeaders,
    #[serde(default)]
    pub egress: ModHeaders,
    #[serde(default)]
    pub force_close: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metrics {
    pub enabled: bool,
    /// Prometheus scrape listener address.
    pub listen: Option<String>,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    fn is_dev(&self) -> bool;
    fn is_test(&self) -> bool;
    fn listen(&self) -> &str;
    fn upstream(&self) -> &Upstream;
    fn remap(&self) -> &Remap;
    fn metrics(&self) -> Option<&Metrics>;
    /// Upstream base URI, `scheme://host`.
    fn target(&self) -> Result<Uri>;
    fn forward_proxy(&self) -> Result<Option<Url>>;
    fn transport(&self) -> TransportConfig;
    fn limits(&self) -> Limits;
}

// Config type alias for convenience
pub type Config = Edge;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.proxy.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.proxy.env == PROD
    }

    fn is_dev(&self) -> bool {
        self.proxy.env == DEV
    }

    fn is_test(&self) -> bool {
        self.proxy.env == TEST
    }

    fn listen(&self) -> &str {
        self.proxy.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    fn upstream(&self) -> &Upstream {
        &self.proxy.upstream
    }

    fn remap(&self) -> &Remap {
        &self.proxy.remap
    }

    fn metrics(&self) -> Option<&Metrics> {
        self.proxy.metrics.as_ref()
    }

    fn target(&self) -> Result<Uri> {
        let up = self.upstream();
        let scheme = up.scheme.as_deref().unwrap_or(DEFAULT_SCHEME);
        format!("{}://{}", scheme, up.host)
            .parse()
            .with_context(|| format!("invalid upstream {}://{}", scheme, up.host))
    }

    fn forward_proxy(&self) -> Result<Option<Url>> {
        match self.upstream().forward_proxy.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Url::parse(raw)
                .map(Some)
                .with_context(|| format!("invalid forward proxy url {:?}", raw)),
        }
    }

    fn transport(&self) -> TransportConfig {
        let up = self.upstream();
        let defaults = TransportConfig::default();
        TransportConfig {
            timeout: up.timeout.unwrap_or(defaults.timeout),
            connect_timeout: up.connect_timeout.unwrap_or(defaults.connect_timeout),
            body_timeout: up.body_timeout,
            pool_idle_timeout: up.idle_timeout.unwrap_or(defaults.pool_idle_timeout),
            pool_max_idle_per_host: up.max_idle_per_host.unwrap_or(defaults.pool_max_idle_per_host),
        }
    }

    fn limits(&self) -> Limits {
        let defaults = Limits::default();
        Limits {
            idle_timeout: self.proxy.client_idle_timeout.unwrap_or(defaults.idle_timeout),
            ..defaults
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        let cfg = Self::from_yaml(&data)
            .with_context(|| format!("unmarshal yaml from {:?}", abs_path))?;

        Ok(cfg)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Edge = serde_yaml::from_str(data)?;

        if cfg.proxy.upstream.host.is_empty() {
            anyhow::bail!("no upstream host configured");
        }
        cfg.target()?;
        cfg.forward_proxy()?;

        Ok(cfg)
    }
}

// Test config is always available for integration tests
mod test_config;
pub use test_config::new_test_config;
