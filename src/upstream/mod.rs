//! Upstream side of the proxy: transports, forwarding and header hygiene.

pub mod error;
pub mod requester;
pub mod sanitize;
pub mod transport;


pub use error::UpstreamError;
pub use requester::{forward, Forwarded, Timing};
pub use transport::{BoxError, HyperTransport, Route, Transport, TransportConfig, UpstreamBody};
