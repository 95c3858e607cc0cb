//! HTTP/1.1 front: accepts client connections and drives the forwarding pipeline.

mod parse;
mod server;

#[cfg(test)]
mod parse_test;

pub use parse::{read_request, Limits, ReadError};
pub use server::Server;
