// Shared test support code: fake and real upstreams, plus the edge harness.

pub mod harness;
pub mod transport;
pub mod upstream;

pub use harness::EdgeServer;
pub use upstream::UpstreamServer;
