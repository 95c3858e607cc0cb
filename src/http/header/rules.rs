//! Declarative header mutation rules.

use serde::{Deserialize, Serialize};
use tracing::{debug, Span};

use super::HeaderCollection;

/// A single header to set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Hdr {
    pub name: String,
    pub value: String,
}

impl Hdr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Set/drop rules for one direction of a remap.
///
/// Built once from configuration and shared read-only across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModHeaders {
    #[serde(default)]
    pub set: Vec<Hdr>,
    #[serde(default)]
    pub drop: Vec<String>,
}

impl ModHeaders {
    pub fn new(set: Vec<Hdr>, drop: Vec<String>) -> Self {
        Self { set, drop }
    }

    /// Returns whether any modification exists.
    pub fn has_any(&self) -> bool {
        !self.set.is_empty() || !self.drop.is_empty()
    }

    /// Drops and then sets headers in `headers` according to the rules.
    ///
    /// An empty collection has nothing to drop, so only the set rules run;
    /// with no set rules it stays empty. Responses that never arrived carry
    /// no collection at all and are not passed here.
    pub fn apply(&self, headers: &mut HeaderCollection, log: &Span) {
        if headers.is_empty() {
            debug!(
                parent: log,
                component = "modhdrs",
                event = "empty_headers",
                sets = self.set.len(),
                "header collection is empty, skipping drops"
            );
        } else {
            self.drop_all(headers, log);
        }
        for hdr in &self.set {
            debug!(
                parent: log,
                component = "modhdrs",
                event = "set",
                header = %hdr.name,
                value = %hdr.value,
                "setting header"
            );
            headers.set(&hdr.name, &hdr.value);
        }
    }

    fn drop_all(&self, headers: &mut HeaderCollection, log: &Span) {
        for name in &self.drop {
            debug!(parent: log, component = "modhdrs", event = "drop", header = %name, "dropping header");
            headers.remove(name);
        }
    }
}
