// HTTP module: server, upstream client, headers, response writing and accounting.

pub mod accounting;
pub mod addr;
pub mod client;
pub mod date;
pub mod header;
pub mod request;
pub mod server;
pub mod writer;

#[cfg(test)]
mod accounting_test;

pub use request::ClientRequest;
pub use server::Server;
pub use writer::{Http1ResponseWriter, ResponseSink};
