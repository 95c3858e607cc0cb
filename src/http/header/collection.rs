//! Case-insensitive, order-preserving header multi-map.
//!
//! Names are matched case-insensitively through a lower-cased key, while the
//! display name is kept as first inserted so the wire output keeps the case
//! the source used. Values for one name keep their insertion order.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    key: String,
    name: String,
    values: Vec<String>,
}

/// Ordered header collection with multi-value semantics.
///
/// Cloning produces an independent copy, nothing is shared with the source.
/// Equality ignores the order of distinct names but not the order of values.
#[derive(Debug, Clone, Default)]
pub struct HeaderCollection {
    fields: Vec<Field>,
}

impl PartialEq for HeaderCollection {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|f| other.get_all(&f.key) == f.values.as_slice())
    }
}

impl Eq for HeaderCollection {}

impl HeaderCollection {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.key.eq_ignore_ascii_case(name))
    }

    /// Appends a value, keeping any existing values for the name.
    pub fn add(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(idx) => self.fields[idx].values.push(value.to_string()),
            None => self.fields.push(Field {
                key: name.to_ascii_lowercase(),
                name: name.to_string(),
                values: vec![value.to_string()],
            }),
        }
    }

    /// Replaces every existing value for the name with the single given value.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(idx) => {
                let field = &mut self.fields[idx];
                field.values.clear();
                field.values.push(value.to_string());
            }
            None => self.add(name, value),
        }
    }

    /// Removes the name and all of its values. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.fields.remove(idx);
                true
            }
            None => false,
        }
    }

    /// First value for the name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|idx| self.fields[idx].values.first())
            .map(String::as_str)
    }

    /// All values for the name, in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(idx) => &self.fields[idx].values,
            None => &[],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates `(display name, values)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.values.as_slice()))
    }

    /// Iterates every `(name, value)` pair, one per value.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|f| {
            f.values
                .iter()
                .map(move |v| (f.name.as_str(), v.as_str()))
        })
    }

    /// Adds every value of every header of `self` into `dest`.
    /// Nothing already staged in `dest` is cleared.
    pub fn copy_to(&self, dest: &mut HeaderCollection) {
        for (name, value) in self.pairs() {
            dest.add(name, value);
        }
    }

    /// Builds a collection from a hyper header map.
    ///
    /// Hyper lower-cases names, so they are canonicalised for output.
    /// Values that are not valid visible ASCII are skipped.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut out = Self::with_capacity(map.keys_len());
        for (name, value) in map.iter() {
            if let Ok(value) = value.to_str() {
                out.add(&canonical_name(name.as_str()), value);
            }
        }
        out
    }

    /// Converts into a hyper header map. Invalid names or values are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.fields.len());
        for (name, value) in self.pairs() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderCollection {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut out = Self::new();
        for (name, value) in iter {
            out.add(name, value);
        }
        out
    }
}

/// Canonical MIME form: first letter and every letter after a hyphen upper-cased.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
