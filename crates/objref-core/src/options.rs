//! Engine options
//!
//! [`Options`] is the complete, immutable configuration bound to an engine.
//! [`OptionsUpdate`] is a partial set of changes; fields left unset keep
//! whatever the options being updated already hold.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::value::Value;

/// Default reference delimiter
pub const DEFAULT_DELIMITER: &str = "%";

/// Options for resolving references in a document
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// String that opens and closes a reference token
    pub delimiter: String,
    /// Descend into nested mappings and sequences
    pub recursive: bool,
    /// Mapping merged into every parsed document before resolution
    pub global: IndexMap<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            recursive: true,
            global: IndexMap::new(),
        }
    }
}

impl Options {
    /// Apply an update field by field, keeping current values for unset fields
    ///
    /// An empty delimiter counts as unset.
    pub fn merged(&self, update: OptionsUpdate) -> Options {
        Options {
            delimiter: update
                .delimiter
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| self.delimiter.clone()),
            recursive: update.recursive.unwrap_or(self.recursive),
            global: update.global.unwrap_or_else(|| self.global.clone()),
        }
    }

    /// The global overlay as a document value
    pub fn global_value(&self) -> Value {
        Value::Mapping(self.global.clone())
    }
}

/// A partial options change
///
/// Can be built in code or deserialized from YAML/JSON:
///
/// ```rust
/// use objref_core::OptionsUpdate;
///
/// let update = OptionsUpdate::from_yaml("delimiter: '='\nrecursive: false").unwrap();
/// assert_eq!(update.delimiter.as_deref(), Some("="));
/// assert_eq!(update.recursive, Some(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsUpdate {
    /// New delimiter
    pub delimiter: Option<String>,
    /// New recursion flag
    pub recursive: Option<bool>,
    /// New global overlay (replaces the current one wholesale)
    pub global: Option<IndexMap<String, Value>>,
}

impl OptionsUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Set the recursion flag
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    /// Set the global overlay
    pub fn global(mut self, global: IndexMap<String, Value>) -> Self {
        self.global = Some(global);
        self
    }

    /// Parse an update from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))
    }

    /// Parse an update from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))
    }
}

impl From<Options> for OptionsUpdate {
    fn from(options: Options) -> Self {
        Self {
            delimiter: Some(options.delimiter),
            recursive: Some(options.recursive),
            global: Some(options.global),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn overlay(key: &str, value: &str) -> IndexMap<String, Value> {
        let mut global = IndexMap::new();
        global.insert(key.to_string(), Value::from(value));
        global
    }

    #[test]
    fn test_defaults() {
        let options = Options::default();

        assert_eq!(options.delimiter, "%");
        assert!(options.recursive);
        assert!(options.global.is_empty());
    }

    #[test]
    fn test_empty_update_keeps_everything() {
        let current = Options {
            delimiter: "=".into(),
            recursive: false,
            global: overlay("cwd", "/root"),
        };

        assert_eq!(current.merged(OptionsUpdate::new()), current);
    }

    #[test]
    fn test_update_keeps_customized_fields() {
        let current = Options::default().merged(OptionsUpdate::new().recursive(false));
        let updated = current.merged(OptionsUpdate::new().delimiter("="));

        // recursive stays at the customized value, not the factory default
        assert_eq!(updated.delimiter, "=");
        assert!(!updated.recursive);
    }

    #[test]
    fn test_update_replaces_global_wholesale() {
        let current = Options::default().merged(OptionsUpdate::new().global(overlay("a", "1")));
        let updated = current.merged(OptionsUpdate::new().global(overlay("b", "2")));

        assert!(updated.global.get("a").is_none());
        assert_eq!(updated.global.get("b"), Some(&Value::from("2")));
    }

    #[test]
    fn test_empty_delimiter_counts_as_unset() {
        let current = Options::default().merged(OptionsUpdate::new().delimiter("="));
        let updated = current.merged(OptionsUpdate::new().delimiter(""));

        assert_eq!(updated.delimiter, "=");
    }

    #[test]
    fn test_update_from_yaml() {
        let update = OptionsUpdate::from_yaml(
            r#"
delimiter: "$$"
global:
  cwd: /srv/app
"#,
        )
        .unwrap();

        assert_eq!(update.delimiter.as_deref(), Some("$$"));
        assert_eq!(update.recursive, None);
        assert_eq!(update.global, Some(overlay("cwd", "/srv/app")));
    }

    #[test]
    fn test_update_from_json_rejects_unknown_fields() {
        assert!(OptionsUpdate::from_json(r#"{"recursive": false}"#).is_ok());
        assert!(OptionsUpdate::from_json(r#"{"recursion": false}"#).is_err());
    }

    #[test]
    fn test_options_into_update_roundtrip() {
        let options = Options {
            delimiter: "#".into(),
            recursive: false,
            global: overlay("x", "y"),
        };

        assert_eq!(
            Options::default().merged(OptionsUpdate::from(options.clone())),
            options
        );
    }
}
