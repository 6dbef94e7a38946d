//! Parameter bindings extracted from a matched usage pattern.
//!
//! A [`Properties`] map is produced fresh for every dispatch and is read-only
//! to the handler. Typed accessors parse the bound word on demand and fall
//! back to a caller-supplied default, so handlers never deal with parse
//! errors for optional parameters.

use std::collections::HashMap;

/// A read-only mapping from parameter name to the word bound by the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    /// Creates an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a binding. Used by the matcher while bindings are being built;
    /// once handed to a handler the map is never mutated again.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the raw bound word for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the bound word for `key`, or `default` if absent.
    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Parses the bound word as an integer, or returns `default`.
    pub fn integer_or(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Parses the bound word as a float, or returns `default`.
    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Parses the bound word as a boolean, or returns `default`.
    ///
    /// Accepts `true`/`false` as well as `1`/`0`.
    pub fn boolean_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("1") => true,
            Some("0") => false,
            Some(v) => v.parse().unwrap_or(default),
            None => default,
        }
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameters were bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
