//! The host session's variable table.
//!
//! A [`Namespace`] is a read-only snapshot of the names a user has bound in
//! their interactive session. The assistant never writes into it; code that
//! needs to run against a table receives its own copy.

mod table;
mod value;

pub use table::{Cell, Column, DType, DataFrame};
pub use value::{FormatError, Function, Object, Value};

/// Names starting with this prefix are internal to the host.
pub const INTERNAL_PREFIX: &str = "_";

/// Input/output history tables kept by interactive shells.
pub const RESERVED_NAMES: [&str; 2] = ["In", "Out"];

/// Whether `name` is host-internal or reserved.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with(INTERNAL_PREFIX) || RESERVED_NAMES.contains(&name)
}

/// Ordered name → value snapshot of a host session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    entries: Vec<(String, Value)>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing an existing binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ns = Namespace::new();
        for (name, value) in iter {
            ns.insert(name, value);
        }
        ns
    }
}
