//! Open attribute maps attached to nodes and edges.
//!
//! Producers may attach arbitrary keys; consumers read the keys they know
//! through typed accessors and ignore the rest. Values are a closed union so
//! readers can match exhaustively instead of probing an untyped blob.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Free-form text (names, paths, versions).
    String(String),
    /// Numeric value (durations, costs, counts).
    Number(f64),
    /// Flag value.
    Bool(bool),
    /// Nested mapping (e.g. resource requirements).
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Return the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the numeric payload, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the boolean payload, if this is a flag.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the nested map, if this is a map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered string → [`AttrValue`] mapping.
///
/// Ordering is by key so serialized output and hashes are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    /// Create an empty attribute map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace a value, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    /// Look up a string value. Values of other shapes read as absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(AttrValue::as_str)
    }

    /// Look up a numeric value. Values of other shapes read as absent.
    #[must_use]
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(AttrValue::as_number)
    }

    /// Look up a boolean value. Values of other shapes read as absent.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(AttrValue::as_bool)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into `self`.
    ///
    /// Keys absent from `self` are always filled. Keys already present are
    /// only overwritten when `authoritative` is set.
    pub fn merge_from(&mut self, other: &Self, authoritative: bool) {
        for (key, value) in &other.0 {
            if authoritative || !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_fills_missing_keys_only() {
        let mut base = Attributes::new().with("name", "a.py");
        let incoming = Attributes::new()
            .with("name", "other.py")
            .with("language", "python");

        base.merge_from(&incoming, false);

        assert_eq!(base.get_str("name"), Some("a.py"));
        assert_eq!(base.get_str("language"), Some("python"));
    }

    #[test]
    fn authoritative_merge_overrides() {
        let mut base = Attributes::new().with("version", "1.0");
        let incoming = Attributes::new().with("version", "2.0");

        base.merge_from(&incoming, true);

        assert_eq!(base.get_str("version"), Some("2.0"));
    }

    #[test]
    fn typed_accessors_ignore_mismatched_shapes() {
        let attrs = Attributes::new()
            .with("estimated_duration", "fast")
            .with("cached", true);

        assert_eq!(attrs.get_number("estimated_duration"), None);
        assert_eq!(attrs.get_bool("cached"), Some(true));
        assert_eq!(attrs.get_str("missing"), None);
    }

    #[test]
    fn deserializes_nested_values() {
        let attrs: Attributes = serde_json::from_str(
            r#"{"name": "lint", "estimated_duration": 12, "resources": {"cpu": 2, "gpu": false}}"#,
        )
        .expect("parse attributes");

        assert_eq!(attrs.get_number("estimated_duration"), Some(12.0));
        let resources = attrs
            .get("resources")
            .and_then(AttrValue::as_map)
            .expect("resources map");
        assert_eq!(resources.get("cpu"), Some(&AttrValue::Number(2.0)));
        assert_eq!(resources.get("gpu"), Some(&AttrValue::Bool(false)));
    }
}
