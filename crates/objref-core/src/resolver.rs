//! Reference resolution
//!
//! A [`Resolver`] reads reference paths out of a target tree. When the value
//! found is itself a string carrying references, its delimiters are stripped
//! and the result is looked up again, until a value that is not a reference
//! string is reached. Paths visited along the way are tracked so that a
//! chain leading back onto itself fails instead of looping.

use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use crate::value::Value;

/// The value a reference resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// The final value of the chain
    pub value: &'a Value,
    /// The path the final value was read from
    pub path: String,
    /// Whether the final value came from the fallback tree
    pub from_fallback: bool,
}

/// The outcome of substituting the references of one string
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution<'a> {
    /// No reference in the string could be resolved
    Unchanged,
    /// The string was exactly one reference; it becomes the referenced value
    Value(Resolved<'a>),
    /// Some tokens were replaced by the string form of their values
    Text(String),
}

/// Resolves references against a target tree
pub struct Resolver<'a> {
    tokenizer: &'a Tokenizer,
    target: &'a Value,
    fallback: Option<&'a Value>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver reading from `target`
    pub fn new(tokenizer: &'a Tokenizer, target: &'a Value) -> Self {
        Self {
            tokenizer,
            target,
            fallback: None,
        }
    }

    /// Also read from `fallback` for paths missing in the target
    pub fn with_fallback(mut self, fallback: Option<&'a Value>) -> Self {
        self.fallback = fallback;
        self
    }

    fn lookup(&self, path: &str) -> Option<(&'a Value, bool)> {
        match self.target.lookup(path) {
            Some(value) => Some((value, false)),
            None => self.fallback?.lookup(path).map(|value| (value, true)),
        }
    }

    /// Follow a reference token to its final value
    ///
    /// Returns `Ok(None)` when any path along the chain is missing.
    pub fn resolve_reference(&self, token: &str) -> Result<Option<Resolved<'a>>> {
        let mut chain: Vec<String> = Vec::new();
        let mut candidate = token;

        loop {
            let path = self.tokenizer.strip(candidate);

            if chain.contains(&path) {
                chain.push(path);
                let origin = chain[0].clone();
                return Err(Error::circular_reference(origin, chain));
            }
            chain.push(path.clone());

            let Some((value, from_fallback)) = self.lookup(&path) else {
                log::debug!("Reference {} not resolved: '{}' not found", token, path);
                return Ok(None);
            };

            match value {
                Value::String(s) if self.tokenizer.has_references(s) => {
                    log::trace!("Reference {} continues through '{}' = {:?}", token, path, s);
                    candidate = s;
                }
                _ => {
                    return Ok(Some(Resolved {
                        value,
                        path,
                        from_fallback,
                    }))
                }
            }
        }
    }

    /// Substitute every reference in `text`
    ///
    /// Tokens are processed against the original text from left to right;
    /// unresolved tokens are copied through unchanged.
    pub fn substitute(&self, text: &str) -> Result<Substitution<'a>> {
        let references = self.tokenizer.references(text);

        if let [only] = references.as_slice() {
            if only.is_whole(text) {
                return Ok(match self.resolve_reference(only.token)? {
                    Some(resolved) => Substitution::Value(resolved),
                    None => Substitution::Unchanged,
                });
            }
        }

        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        let mut changed = false;

        for reference in &references {
            result.push_str(&text[last..reference.start]);
            match self.resolve_reference(reference.token)? {
                Some(resolved) => {
                    result.push_str(&resolved.value.to_string());
                    changed = true;
                }
                None => result.push_str(reference.token),
            }
            last = reference.end;
        }
        result.push_str(&text[last..]);

        if changed {
            Ok(Substitution::Text(result))
        } else {
            Ok(Substitution::Unchanged)
        }
    }

    /// Resolve the references in `text` to a value
    ///
    /// A string that is exactly one resolvable reference yields the
    /// referenced value with its own type; otherwise the result is a string.
    pub fn parse_references(&self, text: &str) -> Result<Value> {
        Ok(match self.substitute(text)? {
            Substitution::Unchanged => Value::String(text.to_string()),
            Substitution::Value(resolved) => resolved.value.clone(),
            Substitution::Text(s) => Value::String(s),
        })
    }
}
