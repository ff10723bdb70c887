// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A mapping from trait names to lists of values.
///
/// Traits are attached at every level of the hierarchy (assembly, collection, class, method and
/// test). Keys keep their insertion order. Values are not deduplicated: the same value may appear
/// more than once for a key.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Traits(IndexMap<String, Vec<String>>);

impl Traits {
    /// Creates an empty set of traits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for the given key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Returns the values for a key, if any were added.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Returns true if `value` was added for `key`.
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    /// Iterates over keys and their values, in key insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no traits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges the traits from an inner scope into this one.
    ///
    /// Keys are unioned; for keys present in both, the values from `other` are appended after the
    /// existing ones.
    pub fn merge_from(&mut self, other: &Traits) {
        for (key, values) in &other.0 {
            self.0
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Merges a sequence of scopes, outermost first.
    pub fn merged<'a>(scopes: impl IntoIterator<Item = &'a Traits>) -> Self {
        let mut out = Self::new();
        for scope in scopes {
            out.merge_from(scope);
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Traits {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut traits = Self::new();
        for (key, value) in iter {
            traits.add(key, value);
        }
        traits
    }
}
