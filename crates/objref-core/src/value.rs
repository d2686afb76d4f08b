//! Document value types
//!
//! A document is a tree of scalars (string, int, float, bool, null),
//! sequences (arrays) and mappings (objects). String leaves may embed
//! reference tokens such as `%database.host%`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A document node that may contain unresolved references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[derive(Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value (may contain references like %path.to.value%)
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Check if this value is a mapping or a sequence
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Mapping(_) | Value::Sequence(_))
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a dotted path (e.g., "database.host" or "servers.0.name")
    ///
    /// Segments address mapping keys; a segment applied to a sequence must
    /// parse as an index. The empty path is the value itself. Returns `None`
    /// when any segment is missing.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }

        path.split('.')
            .try_fold(self, |current, segment| match current {
                Value::Mapping(map) => map.get(segment),
                Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
                _ => None,
            })
    }

    /// The location a dotted path points at, following [`Value::lookup`] rules
    pub fn locate(&self, path: &str) -> Option<Vec<PathSegment>> {
        if path.is_empty() {
            return Some(Vec::new());
        }

        let mut current = self;
        let mut location = Vec::new();

        for segment in path.split('.') {
            let (next, step) = match current {
                Value::Mapping(map) => (map.get(segment)?, PathSegment::Key(segment.to_string())),
                Value::Sequence(seq) => {
                    let idx = segment.parse::<usize>().ok()?;
                    (seq.get(idx)?, PathSegment::Index(idx))
                }
                _ => return None,
            };
            location.push(step);
            current = next;
        }

        Some(location)
    }

    /// Get a value by dotted path, failing if it does not exist
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        self.lookup(path).ok_or_else(|| Error::path_not_found(path))
    }

    /// Get the value at a location
    pub fn at(&self, location: &[PathSegment]) -> Option<&Value> {
        location
            .iter()
            .try_fold(self, |current, segment| match (current, segment) {
                (Value::Mapping(map), PathSegment::Key(key)) => map.get(key.as_str()),
                (Value::Sequence(seq), PathSegment::Index(idx)) => seq.get(*idx),
                _ => None,
            })
    }

    /// Get a mutable value at a location
    pub fn at_mut(&mut self, location: &[PathSegment]) -> Option<&mut Value> {
        let mut current = self;

        for segment in location {
            current = match (current, segment) {
                (Value::Mapping(map), PathSegment::Key(key)) => map.get_mut(key.as_str())?,
                (Value::Sequence(seq), PathSegment::Index(idx)) => seq.get_mut(*idx)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Locations of the direct children of this value, in iteration order
    pub fn child_segments(&self) -> Vec<PathSegment> {
        match self {
            Value::Mapping(map) => map.keys().cloned().map(PathSegment::Key).collect(),
            Value::Sequence(seq) => (0..seq.len()).map(PathSegment::Index).collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Merge another value into this one (deep merge)
    ///
    /// Merge semantics:
    /// - Mappings: Deep merge recursively
    /// - Scalars (null included): `other` wins
    /// - Sequences: `other` replaces entirely
    /// - Type mismatch: `other` wins
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                for (key, overlay_value) in overlay {
                    if let Some(base_value) = base.get_mut(&key) {
                        base_value.merge(overlay_value);
                    } else {
                        base.insert(key, overlay_value);
                    }
                }
            }
            (this, other) => {
                *this = other;
            }
        }
    }

    /// Create a merged value from two values (non-mutating)
    pub fn merged(mut self, other: Value) -> Value {
        self.merge(other);
        self
    }

    /// Parse a document from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))
    }

    /// Parse a document from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))
    }

    /// Serialize this value as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::parse(e.to_string()))
    }

    /// Serialize this value as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))
    }
}

/// String form used when a value is substituted inside a larger string
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A step from a container to one of its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A key in a mapping (e.g., "database" in "database.host")
    Key(String),
    /// An index in a sequence (e.g., 0 in "servers[0]")
    Index(usize),
}

/// Render a location as "key.subkey[0].name" for diagnostics
pub fn format_location(location: &[PathSegment]) -> String {
    let mut out = String::new();

    for segment in location {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(idx) => {
                out.push_str(&format!("[{}]", idx));
            }
        }
    }

    if out.is_empty() {
        "<root>".to_string()
    } else {
        out
    }
}
