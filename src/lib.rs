pub mod app;
pub mod config;
pub mod controller;
pub mod http;
pub mod metrics;
pub mod shutdown;
pub mod upstream;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;
