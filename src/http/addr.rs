//! Client address resolution from connection metadata and `X-Forwarded-For`.

use std::net::IpAddr;

use crate::http::request::ClientRequest;

pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("malformed client address '{0}'")]
    MalformedAddress(String),
    #[error("malformed client IP address '{0}'")]
    MalformedIp(String),
}

/// Client IP and port, recomputed for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientAddress {
    pub ip: String,
    pub port: String,
}

impl ClientAddress {
    pub fn new(ip: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: port.into(),
        }
    }
}

/// Returns the client IP and port of the request.
///
/// The IP is the first `X-Forwarded-For` entry when one is present, otherwise
/// the socket peer. The port always comes from the socket address, since
/// forwarded-for carries none.
pub fn resolve_client_address(req: &ClientRequest) -> ClientAddress {
    let forwarded = req
        .headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .filter(|first| !first.is_empty());

    match (split_host_port(&req.remote_addr), forwarded) {
        (Ok((_, port)), Some(ip)) => ClientAddress::new(ip.trim(), port),
        (Err(_), Some(ip)) => ClientAddress::new(ip.trim(), ""),
        (Ok((host, port)), None) => ClientAddress::new(host, port),
        (Err(_), None) => ClientAddress::new(req.remote_addr.as_str(), ""),
    }
}

/// Returns the IP of the socket peer. Forwarded-for is never consulted.
pub fn resolve_ip(req: &ClientRequest) -> Result<IpAddr, AddressError> {
    let (host, _) = split_host_port(&req.remote_addr)
        .map_err(|_| AddressError::MalformedAddress(req.remote_addr.clone()))?;
    host.parse()
        .map_err(|_| AddressError::MalformedIp(host.to_string()))
}

/// Splits `host:port` or `[host]:port` into host and port.
///
/// The port must be present (it may be empty after the colon), an unbracketed
/// host may not contain a colon, and stray brackets are rejected.
pub fn split_host_port(hostport: &str) -> Result<(&str, &str), AddressError> {
    let malformed = || AddressError::MalformedAddress(hostport.to_string());

    let colon = hostport.rfind(':').ok_or_else(malformed)?;
    let (host, rest_from) = if hostport.starts_with('[') {
        let end = hostport.find(']').ok_or_else(malformed)?;
        if end + 1 != colon {
            return Err(malformed());
        }
        (&hostport[1..end], end + 1)
    } else {
        let host = &hostport[..colon];
        if host.contains(':') {
            return Err(malformed());
        }
        (host, 0)
    };

    let opening_from = if rest_from == 0 { 0 } else { 1 };
    if hostport[opening_from..].contains('[') || hostport[rest_from..].contains(']') {
        return Err(malformed());
    }

    Ok((host, &hostport[colon + 1..]))
}
