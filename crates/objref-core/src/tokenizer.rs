//! Reference tokenizer
//!
//! Finds reference tokens such as `%database.host%` in a string. A token is
//! the delimiter, any run of path characters (ASCII letters, digits, `_` and
//! `.`), and the delimiter again. Characters that occur in the delimiter are
//! never path characters. The degenerate token made of two adjacent
//! delimiters (`%%`) is not a reference.

use regex::Regex;

use crate::error::{Error, Result};

/// Path characters allowed between delimiters, as a regex class body
const PATH_CLASS: &str = "a-zA-Z0-9_.";

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// A reference token found in a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'t> {
    /// The full token including delimiters (e.g., "%a.b%")
    pub token: &'t str,
    /// The path between the delimiters (e.g., "a.b")
    pub path: &'t str,
    /// Byte offset of the token start
    pub start: usize,
    /// Byte offset one past the token end
    pub end: usize,
}

impl Reference<'_> {
    /// Check if this token spans the whole of `text`
    pub fn is_whole(&self, text: &str) -> bool {
        self.start == 0 && self.end == text.len()
    }
}

/// Tokenizer bound to one delimiter
#[derive(Debug, Clone)]
pub struct Tokenizer {
    delimiter: String,
    pattern: Regex,
}

impl Tokenizer {
    /// Build a tokenizer for the given delimiter
    pub fn new(delimiter: &str) -> Result<Self> {
        if delimiter.is_empty() {
            return Err(Error::invalid_delimiter(
                delimiter,
                "delimiter must not be empty",
            ));
        }

        let excluded: String = delimiter.chars().filter(|c| is_path_char(*c)).collect();
        let class = if excluded.is_empty() {
            format!("[{}]", PATH_CLASS)
        } else {
            format!("[[{}]--[{}]]", PATH_CLASS, regex::escape(&excluded))
        };

        let escaped = regex::escape(delimiter);
        let pattern = Regex::new(&format!("{escaped}{class}*{escaped}"))
            .map_err(|e| Error::invalid_delimiter(delimiter, e.to_string()))?;

        Ok(Self {
            delimiter: delimiter.to_string(),
            pattern,
        })
    }

    /// The delimiter this tokenizer matches
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// All valid references in `text`, left to right
    ///
    /// Matches never overlap. An empty `%%` match is dropped after it has
    /// consumed its delimiters, so `%%a%` contains no reference.
    pub fn references<'t>(&self, text: &'t str) -> Vec<Reference<'t>> {
        let width = self.delimiter.len();

        self.pattern
            .find_iter(text)
            .filter(|m| self.is_valid_reference(m.as_str()))
            .map(|m| {
                let token = m.as_str();
                Reference {
                    token,
                    path: &token[width..token.len() - width],
                    start: m.start(),
                    end: m.end(),
                }
            })
            .collect()
    }

    /// All valid reference tokens in `text`, duplicates preserved
    pub fn reference_keys(&self, text: &str) -> Vec<String> {
        self.references(text)
            .into_iter()
            .map(|r| r.token.to_string())
            .collect()
    }

    /// Check if `text` contains at least one valid reference
    pub fn has_references(&self, text: &str) -> bool {
        self.pattern
            .find_iter(text)
            .any(|m| self.is_valid_reference(m.as_str()))
    }

    /// False only for the degenerate two-delimiter token
    ///
    /// The path characters are not re-checked; use this on tokens produced
    /// by [`Tokenizer::references`].
    pub fn is_valid_reference(&self, candidate: &str) -> bool {
        is_valid_reference(candidate, &self.delimiter)
    }

    /// Remove every occurrence of the delimiter from `text`
    pub fn strip(&self, text: &str) -> String {
        text.replace(&self.delimiter, "")
    }
}

/// False only when `candidate` is exactly the delimiter written twice
pub fn is_valid_reference(candidate: &str, delimiter: &str) -> bool {
    candidate.len() != delimiter.len() * 2
        || !candidate.starts_with(delimiter)
        || !candidate.ends_with(delimiter)
}
