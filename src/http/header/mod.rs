//! HTTP header collection and remap header mutation rules.

mod collection;
mod rules;

pub use collection::{canonical_name, HeaderCollection};
pub use rules::{Hdr, ModHeaders};

#[cfg(test)]
mod rules_test;
