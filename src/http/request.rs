//! Inbound client request as seen by the forwarding pipeline.

use bytes::Bytes;
use std::collections::HashMap;

use crate::http::header::HeaderCollection;

/// A parsed client request plus its connection metadata.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub method: String,
    /// Origin-form target: path and optional query.
    pub target: String,
    /// Minor HTTP/1 version (0 or 1).
    pub version: u8,
    pub headers: HeaderCollection,
    pub body: Bytes,
    /// Peer address of the client connection, `host:port`.
    pub remote_addr: String,
    /// Opaque per-request data shared with external plugins.
    pub plugin_data: HashMap<String, String>,
}

impl ClientRequest {
    pub fn new(method: &str, target: &str, remote_addr: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            version: 1,
            headers: HeaderCollection::new(),
            body: Bytes::new(),
            remote_addr: remote_addr.to_string(),
            plugin_data: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }

    /// Whether the client asked to keep the connection open afterwards.
    pub fn wants_keep_alive(&self) -> bool {
        let tokens = |want: &str| {
            self.headers
                .get_all("Connection")
                .iter()
                .flat_map(|v| v.split(','))
                .any(|t| t.trim().eq_ignore_ascii_case(want))
        };
        if self.version == 0 {
            tokens("keep-alive")
        } else {
            !tokens("close")
        }
    }
}
