//! Integration tests for edgefwd.
//!
//! End-to-end cases run a real edge application between a reqwest client
//! and an axum upstream, both on loopback ports.


pub mod support;
