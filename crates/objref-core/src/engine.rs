//! The reference engine
//!
//! [`Engine::parse`] walks a document depth-first and rewrites every string
//! leaf that carries references. Lookups always read the live top-level
//! document, so entries rewritten earlier in the walk are seen by later ones.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::options::{Options, OptionsUpdate};
use crate::resolver::{Resolver, Substitution};
use crate::tokenizer::{self, Tokenizer};
use crate::value::{format_location, PathSegment, Value};

/// Create an engine from default options overridden by `update`
pub fn create(update: OptionsUpdate) -> Result<Engine> {
    Engine::new(Options::default().merged(update))
}

/// What the walker does with one entry
enum Step {
    Skip,
    Descend,
    Replace(Value),
    /// Copy the container found at `source`
    Alias { source: Vec<PathSegment> },
}

/// A location holding a copy of the container at `source`
struct Alias {
    target: Vec<PathSegment>,
    source: Vec<PathSegment>,
}

/// State carried through one `parse`
struct Walk<'e> {
    /// Read for paths the document lacks
    fallback: Option<&'e Value>,
    /// Sources resolved in place before being copied, innermost last
    resolving: Vec<Vec<PathSegment>>,
    aliases: Vec<Alias>,
}

/// Resolves references in documents using one set of options
#[derive(Debug, Clone)]
pub struct Engine {
    options: Options,
    tokenizer: Tokenizer,
    global: Value,
}

impl Engine {
    /// Create an engine bound to `options`
    pub fn new(options: Options) -> Result<Self> {
        let tokenizer = Tokenizer::new(&options.delimiter)?;
        let global = options.global_value();
        Ok(Self {
            options,
            tokenizer,
            global,
        })
    }

    /// The options this engine resolves with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The tokenizer for the configured delimiter
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Replace the options, keeping current values for fields `update` leaves unset
    pub fn set_options(&mut self, update: OptionsUpdate) -> Result<&mut Self> {
        let options = self.options.merged(update);

        if options.delimiter != self.options.delimiter {
            self.tokenizer = Tokenizer::new(&options.delimiter)?;
        }
        self.global = options.global_value();
        self.options = options;

        Ok(self)
    }

    /// Resolve every reference in `document`, in place
    ///
    /// The global overlay is merged into a mapping document first; a
    /// sequence document reads it for paths it lacks. Scalar documents are
    /// left alone. Unresolvable references stay as written; a circular
    /// reference aborts the walk with an error, leaving entries visited so
    /// far already rewritten.
    pub fn parse(&self, document: &mut Value) -> Result<&Self> {
        if !document.is_container() {
            log::debug!(
                "Ignoring {} document: only mappings and sequences are parsed",
                document.type_name()
            );
            return Ok(self);
        }

        let mut fallback = None;
        if !self.options.global.is_empty() {
            if document.is_mapping() {
                document.merge(self.global.clone());
            } else {
                fallback = Some(&self.global);
            }
        }

        let mut state = Walk {
            fallback,
            resolving: Vec::new(),
            aliases: Vec::new(),
        };
        self.walk(document, &mut Vec::new(), &mut state)?;
        sync_aliases(document, &state.aliases);

        Ok(self)
    }

    /// Resolve every reference in `document` and return it
    pub fn resolve(&self, mut document: Value) -> Result<Value> {
        self.parse(&mut document)?;
        Ok(document)
    }

    /// Visit the children of the container at `location`
    fn walk(
        &self,
        root: &mut Value,
        location: &mut Vec<PathSegment>,
        state: &mut Walk<'_>,
    ) -> Result<()> {
        let children = match root.at(location) {
            Some(node) => node.child_segments(),
            None => return Ok(()),
        };

        for segment in children {
            location.push(segment);

            match self.step(root, location, state.fallback)? {
                Step::Skip => {}
                Step::Descend => self.walk(root, location, state)?,
                Step::Replace(value) => write(root, location, value),
                Step::Alias { source } => self.alias(root, location, source, state)?,
            }

            location.pop();
        }

        Ok(())
    }

    /// Write a copy of the container at `source` to `location`
    ///
    /// In recursive mode the source is resolved in place first and the
    /// pair is remembered, so the copy can be refreshed once the whole
    /// document has been walked. A source that encloses `location`, or one
    /// already being resolved, would have to contain itself.
    fn alias(
        &self,
        root: &mut Value,
        location: &[PathSegment],
        source: Vec<PathSegment>,
        state: &mut Walk<'_>,
    ) -> Result<()> {
        if self.options.recursive {
            if location.starts_with(&source) || state.resolving.contains(&source) {
                let chain = vec![format_location(location), format_location(&source)];
                return Err(Error::circular_reference(format_location(location), chain));
            }

            state.resolving.push(source.clone());
            self.walk(root, &mut source.clone(), state)?;
            state.resolving.pop();
        }

        if let Some(value) = root.at(&source).cloned() {
            write(root, location, value);
        }
        if self.options.recursive {
            state.aliases.push(Alias {
                target: location.to_vec(),
                source,
            });
        }

        Ok(())
    }

    /// Decide what to do with the entry at `location`
    fn step(
        &self,
        root: &Value,
        location: &[PathSegment],
        fallback: Option<&Value>,
    ) -> Result<Step> {
        let Some(node) = root.at(location) else {
            return Ok(Step::Skip);
        };

        match node {
            Value::Mapping(_) | Value::Sequence(_) if self.options.recursive => Ok(Step::Descend),
            Value::String(s) if self.tokenizer.has_references(s) => {
                let substitution = Resolver::new(&self.tokenizer, root)
                    .with_fallback(fallback)
                    .substitute(s)
                    .map_err(|e| e.with_path(format_location(location)))?;

                Ok(match substitution {
                    Substitution::Unchanged => Step::Skip,
                    Substitution::Value(resolved) => {
                        let source = if resolved.value.is_container() && !resolved.from_fallback {
                            root.locate(&resolved.path)
                        } else {
                            None
                        };
                        match source {
                            Some(source) => Step::Alias { source },
                            None => Step::Replace(resolved.value.clone()),
                        }
                    }
                    Substitution::Text(text) => Step::Replace(Value::String(text)),
                })
            }
            _ => Ok(Step::Skip),
        }
    }

    /// Resolve the references in `text` against the global overlay
    pub fn parse_references(&self, text: &str) -> Result<Value> {
        Resolver::new(&self.tokenizer, &self.global).parse_references(text)
    }

    /// Like [`Engine::parse_references`] with a different delimiter
    pub fn parse_references_with(&self, text: &str, delimiter: &str) -> Result<Value> {
        let tokenizer = self.tokenizer_for(delimiter)?;
        Resolver::new(&tokenizer, &self.global).parse_references(text)
    }

    /// All reference tokens in `text`
    pub fn reference_keys(&self, text: &str) -> Vec<String> {
        self.tokenizer.reference_keys(text)
    }

    /// All reference tokens in `text` for a different delimiter
    pub fn reference_keys_with(&self, text: &str, delimiter: &str) -> Result<Vec<String>> {
        Ok(self.tokenizer_for(delimiter)?.reference_keys(text))
    }

    /// Check if `text` contains a reference
    pub fn has_references(&self, text: &str) -> bool {
        self.tokenizer.has_references(text)
    }

    /// Check if `text` contains a reference for a different delimiter
    pub fn has_references_with(&self, text: &str, delimiter: &str) -> Result<bool> {
        Ok(self.tokenizer_for(delimiter)?.has_references(text))
    }

    /// False only for the degenerate empty token (e.g. `%%`)
    pub fn is_valid_reference(&self, text: &str) -> bool {
        self.tokenizer.is_valid_reference(text)
    }

    /// Like [`Engine::is_valid_reference`] with a different delimiter
    pub fn is_valid_reference_with(&self, text: &str, delimiter: &str) -> bool {
        let delimiter = if delimiter.is_empty() {
            self.tokenizer.delimiter()
        } else {
            delimiter
        };
        tokenizer::is_valid_reference(text, delimiter)
    }

    /// The engine's tokenizer, or a new one for an explicit delimiter
    fn tokenizer_for(&self, delimiter: &str) -> Result<Cow<'_, Tokenizer>> {
        if delimiter.is_empty() || delimiter == self.tokenizer.delimiter() {
            Ok(Cow::Borrowed(&self.tokenizer))
        } else {
            Ok(Cow::Owned(Tokenizer::new(delimiter)?))
        }
    }
}

fn write(root: &mut Value, location: &[PathSegment], value: Value) {
    log::trace!("Rewriting {} as {}", format_location(location), value.type_name());
    if let Some(slot) = root.at_mut(location) {
        *slot = value;
    }
}

/// Copy every aliased container from its source again
///
/// Sources can still change after their copy was taken. A copy nested in
/// another alias's source may be refreshed after that alias, so passes
/// repeat until nothing changes.
fn sync_aliases(root: &mut Value, aliases: &[Alias]) {
    for _ in 0..aliases.len() {
        let mut changed = false;

        for alias in aliases {
            let Some(value) = root.at(&alias.source).cloned() else {
                continue;
            };
            if let Some(slot) = root.at_mut(&alias.target) {
                if *slot != value {
                    *slot = value;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn parse(document: &mut Value) {
        create(OptionsUpdate::new()).unwrap().parse(document).unwrap();
    }

    fn global(pairs: &[(&str, &str)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_default_reference() {
        let mut data = doc(json!({ "a": "valueA", "b": "%a%" }));
        parse(&mut data);

        assert_eq!(data.lookup("b"), data.lookup("a"));
    }

    #[test]
    fn test_path_reference_keeps_type() {
        let mut data = doc(json!({ "a": { "c": "valueC" }, "b": "%a.c%", "n": "%m%", "m": 5 }));
        parse(&mut data);

        assert_eq!(data.lookup("b"), Some(&Value::from("valueC")));
        assert_eq!(data.lookup("n"), Some(&Value::from(5)));
    }

    #[test]
    fn test_path_reference_with_sub_reference() {
        let mut data = doc(json!({ "a": "%b%", "b": { "c": "%d%" }, "d": 1 }));
        parse(&mut data);

        assert_eq!(data.lookup("a.c"), Some(&Value::from(1)));
        assert_eq!(data.lookup("b.c"), Some(&Value::from(1)));
    }

    #[test]
    fn test_global_reference() {
        let engine = create(OptionsUpdate::new().global(global(&[("cwd", "/srv/app")]))).unwrap();
        let mut data = doc(json!({ "a": "%cwd%" }));
        engine.parse(&mut data).unwrap();

        assert_eq!(data.lookup("a"), Some(&Value::from("/srv/app")));
        // the overlay is merged into the document itself
        assert_eq!(data.lookup("cwd"), Some(&Value::from("/srv/app")));
    }

    #[test]
    fn test_global_overlay_wins() {
        let engine = create(OptionsUpdate::new().global(global(&[("cwd", "/global")]))).unwrap();
        let mut data = doc(json!({ "cwd": "/local", "a": "%cwd%" }));
        engine.parse(&mut data).unwrap();

        assert_eq!(data.lookup("a"), Some(&Value::from("/global")));
    }

    #[test]
    fn test_reference_inside_string() {
        let mut data = doc(json!({ "absolute_path": "%cwd%/dir_name", "cwd": "/root" }));
        parse(&mut data);

        assert_eq!(
            data.lookup("absolute_path"),
            Some(&Value::from("/root/dir_name"))
        );
    }

    #[test]
    fn test_references_inside_string() {
        let mut data = doc(json!({ "dir": "test", "path": "%cwd%/%dir%", "cwd": "/root" }));
        parse(&mut data);

        assert_eq!(data.lookup("path"), Some(&Value::from("/root/test")));
    }

    #[test]
    fn test_no_recursive() {
        let engine = create(OptionsUpdate::new().recursive(false)).unwrap();
        let mut data = doc(json!({ "a": "%b%", "b": { "c": "%d%" }, "d": "valueD" }));
        engine.parse(&mut data).unwrap();

        assert_eq!(data.lookup("a.c"), Some(&Value::from("%d%")));
        assert_eq!(data.lookup("b.c"), Some(&Value::from("%d%")));
    }

    #[test]
    fn test_path_reference_to_reference() {
        let mut data = doc(json!({ "a": "%b.c%", "b": { "c": "%d%" }, "d": "valueD" }));
        parse(&mut data);

        assert_eq!(data.lookup("a"), Some(&Value::from("valueD")));
    }

    #[test]
    fn test_reference_inside_sequence() {
        let mut data = doc(json!({ "a": ["%b.c%", "%d%", "at %d%"], "b": { "c": "%d%" }, "d": "valueD" }));
        parse(&mut data);

        assert_eq!(
            data.lookup("a"),
            Some(&doc(json!(["valueD", "valueD", "at valueD"])))
        );
    }

    #[test]
    fn test_reference_not_found() {
        let mut data = doc(json!({ "a": "%b.d%", "b": { "c": "%d%" }, "d": "valueD", "e": "%f%" }));
        parse(&mut data);

        assert_eq!(data.lookup("a"), Some(&Value::from("%b.d%")));
        assert_eq!(data.lookup("e"), Some(&Value::from("%f%")));
        assert_eq!(data.lookup("b.c"), Some(&Value::from("valueD")));
    }

    #[test]
    fn test_reference_not_found_from_path_reference() {
        let mut data = doc(json!({ "a": "%b.c%", "b": { "c": "%e%" }, "d": "valueD" }));
        parse(&mut data);

        assert_eq!(data.lookup("a"), Some(&Value::from("%b.c%")));
        assert_eq!(data.lookup("b.c"), Some(&Value::from("%e%")));
    }

    #[test]
    fn test_custom_delimiter() {
        let engine = create(OptionsUpdate::new().delimiter("=")).unwrap();
        let mut data = doc(json!({ "a": "valueA", "b": "=a=" }));
        engine.parse(&mut data).unwrap();

        assert_eq!(data.lookup("b"), Some(&Value::from("valueA")));
    }

    #[test]
    fn test_custom_delimiter_from_set_options() {
        let mut engine = create(OptionsUpdate::new()).unwrap();
        engine.set_options(OptionsUpdate::new().delimiter("=")).unwrap();

        let mut data = doc(json!({ "a": "valueA", "b": "=a=", "c": "%a%" }));
        engine.parse(&mut data).unwrap();

        assert_eq!(data.lookup("b"), Some(&Value::from("valueA")));
        assert_eq!(data.lookup("c"), Some(&Value::from("%a%")));
    }

    #[test]
    fn test_set_options_keeps_previous_customizations() {
        let mut engine = create(OptionsUpdate::new().recursive(false).delimiter("=")).unwrap();
        engine
            .set_options(OptionsUpdate::new().global(global(&[("x", "1")])))
            .unwrap();

        assert_eq!(engine.options().delimiter, "=");
        assert!(!engine.options().recursive);
        assert_eq!(engine.parse_references("=x=").unwrap(), Value::from("1"));
    }

    #[test]
    fn test_parse_is_idempotent_once_resolved() {
        let mut data = doc(json!({ "a": "%b%", "b": { "c": "%d%" }, "d": 1, "e": "%missing%" }));
        parse(&mut data);
        let first = data.clone();

        parse(&mut data);
        assert_eq!(data, first);
    }

    #[test]
    fn test_scalar_document_is_ignored() {
        let mut data = Value::from("%a%");
        parse(&mut data);
        assert_eq!(data, Value::from("%a%"));

        let mut data = Value::Null;
        parse(&mut data);
        assert!(data.is_null());
    }

    #[test]
    fn test_sequence_document() {
        let engine = create(OptionsUpdate::new().global(global(&[("cwd", "/root")]))).unwrap();
        let mut data = doc(json!(["value", "%0%", "%cwd%/bin"]));
        engine.parse(&mut data).unwrap();

        assert_eq!(data, doc(json!(["value", "value", "/root/bin"])));
    }

    #[test]
    fn test_sequence_document_reads_global() {
        let engine = create(OptionsUpdate::new().global(global(&[("cwd", "/root")]))).unwrap();
        let mut data = doc(json!(["%cwd%"]));
        engine.parse(&mut data).unwrap();

        // the overlay is read, not merged: no keys are added to a sequence
        assert_eq!(data, doc(json!(["/root"])));
    }

    #[test]
    fn test_later_entries_see_earlier_rewrites() {
        let mut data = Value::from_yaml(
            r#"
name: app
dir: "/srv/%name%"
log: "%dir%/log"
"#,
        )
        .unwrap();
        parse(&mut data);

        assert_eq!(data.lookup("log"), Some(&Value::from("/srv/app/log")));
    }

    #[test]
    fn test_walk_follows_written_order() {
        let mut data = doc(json!({ "b": "%a%/x", "a": "%c%/y", "c": "z" }));
        parse(&mut data);
        // b is visited while a still embeds a reference
        assert_eq!(data.lookup("b"), Some(&Value::from("%a%/x")));
        assert_eq!(data.lookup("a"), Some(&Value::from("z/y")));

        let mut data = doc(json!({ "a": "%c%/y", "b": "%a%/x", "c": "z" }));
        parse(&mut data);
        assert_eq!(data.lookup("b"), Some(&Value::from("z/y/x")));
    }

    #[test]
    fn test_nested_references_resolve_against_root() {
        let mut data = doc(json!({
            "server": { "host": "localhost", "url": "http://%server.host%:%ports.http%" },
            "ports": { "http": 8080 }
        }));
        parse(&mut data);

        assert_eq!(
            data.lookup("server.url"),
            Some(&Value::from("http://localhost:8080"))
        );
    }

    #[test]
    fn test_circular_reference_fails() {
        let mut data = doc(json!({ "a": "%b%", "b": "%a%" }));
        let err = create(OptionsUpdate::new())
            .unwrap()
            .parse(&mut data)
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::CircularReference);
        assert_eq!(err.path.as_deref(), Some("a"));
    }

    #[test]
    fn test_container_containing_itself_fails() {
        let mut data = doc(json!({ "b": { "c": "%b%" } }));
        let err = create(OptionsUpdate::new())
            .unwrap()
            .parse(&mut data)
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::CircularReference);
        assert_eq!(err.path.as_deref(), Some("b.c"));
    }

    #[test]
    fn test_containers_copying_each_other_fail() {
        let mut data = doc(json!({ "x": { "p": "%y%" }, "y": { "q": "%x%" } }));
        let err = create(OptionsUpdate::new())
            .unwrap()
            .parse(&mut data)
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::CircularReference);
    }

    #[test]
    fn test_copied_container_matches_source() {
        // d is rewritten only after a has copied b
        let mut data = Value::from_yaml(
            r#"
a: "%b%"
d: "x%e%"
e: y
b:
  c: "%d%"
"#,
        )
        .unwrap();
        parse(&mut data);

        assert_eq!(data.lookup("b.c"), Some(&Value::from("xy")));
        assert_eq!(data.lookup("a"), data.lookup("b"));
    }

    #[test]
    fn test_nested_copies_match_sources() {
        let mut data = Value::from_yaml(
            r#"
a: "%b%"
d: "x%e%"
e: y
b:
  c: "%f%"
f:
  g: "%d%"
"#,
        )
        .unwrap();
        parse(&mut data);

        assert_eq!(data.lookup("f.g"), Some(&Value::from("xy")));
        assert_eq!(data.lookup("b.c"), data.lookup("f"));
        assert_eq!(data.lookup("a"), data.lookup("b"));
        assert_eq!(data.lookup("a.c.g"), Some(&Value::from("xy")));
    }

    #[test]
    fn test_copied_container_resolved_before_copy() {
        let mut data = Value::from_yaml(
            r#"
a: "%b%"
url: "%a.host%:%a.port%"
b:
  host: "%name%"
  port: 80
name: localhost
"#,
        )
        .unwrap();
        parse(&mut data);

        // later entries reading through the copy see the source's rewrites
        assert_eq!(data.lookup("url"), Some(&Value::from("localhost:80")));
        assert_eq!(data.lookup("a"), data.lookup("b"));
    }

    #[test]
    fn test_container_containing_itself_without_recursion() {
        let engine = create(OptionsUpdate::new().recursive(false)).unwrap();
        let mut data = doc(json!({ "a": "%b%", "b": { "c": "%b%" } }));
        engine.parse(&mut data).unwrap();

        assert_eq!(data.lookup("a.c"), Some(&Value::from("%b%")));
    }

    #[test]
    fn test_chained_parse_calls() {
        let engine = create(OptionsUpdate::new()).unwrap();
        let mut first = doc(json!({ "a": "1", "b": "%a%" }));
        let mut second = doc(json!({ "x": [1, 2], "y": "%x%" }));

        engine
            .parse(&mut first)
            .and_then(|e| e.parse(&mut second))
            .unwrap();

        assert_eq!(first.lookup("b"), Some(&Value::from("1")));
        assert_eq!(second.lookup("y"), Some(&doc(json!([1, 2]))));
    }

    #[test]
    fn test_resolve_returns_new_tree() {
        let engine = create(OptionsUpdate::new()).unwrap();
        let resolved = engine
            .resolve(doc(json!({ "a": "valueA", "b": "%a%" })))
            .unwrap();

        assert_eq!(resolved, doc(json!({ "a": "valueA", "b": "valueA" })));
    }

    #[test]
    fn test_parse_references_against_global() {
        let engine = create(OptionsUpdate::new().global(global(&[("cwd", "/root")]))).unwrap();

        assert_eq!(
            engine.parse_references("%cwd%/bin").unwrap(),
            Value::from("/root/bin")
        );
        assert_eq!(engine.parse_references("%other%").unwrap(), Value::from("%other%"));
        assert_eq!(
            engine.parse_references_with("=cwd=", "=").unwrap(),
            Value::from("/root")
        );
    }

    #[test]
    fn test_tokenizer_passthroughs() {
        let engine = create(OptionsUpdate::new()).unwrap();

        assert_eq!(engine.reference_keys("%a%-%b.c%"), vec!["%a%", "%b.c%"]);
        assert!(engine.reference_keys("none").is_empty());
        assert!(engine.has_references("x %a% y"));
        assert!(!engine.has_references("%%"));
        assert!(engine.is_valid_reference("%a%"));
        assert!(!engine.is_valid_reference("%%"));

        assert_eq!(engine.reference_keys_with("=a= %b%", "=").unwrap(), vec!["=a="]);
        assert!(engine.has_references_with("=a=", "=").unwrap());
        assert!(!engine.is_valid_reference_with("==", "="));
        // an empty delimiter falls back to the engine's own
        assert_eq!(engine.reference_keys_with("%a%", "").unwrap(), vec!["%a%"]);
        assert!(!engine.is_valid_reference_with("%%", ""));
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
