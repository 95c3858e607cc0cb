//! Upstream HTTP clients.

mod hyper_client;

pub use hyper_client::{
    create_client, create_proxy_client, HyperClient, ProxyClient, ProxyConnector, CONNS_PER_HOST,
    MAX_IDLE_CONN_DURATION,
};
