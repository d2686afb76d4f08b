//! Error types for objref
//!
//! Errors are structured: a kind, the document location where the error
//! occurred, an optional underlying cause and an actionable help message.
//! Unresolvable references are not errors; they are left in place.

use std::fmt;

/// Result type alias for objref operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for objref operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Location in the document where the error occurred (e.g., "servers[0].host")
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Error parsing a YAML/JSON document or options
    #[error("Parse error")]
    Parse,
    /// Error accessing a path that doesn't exist
    #[error("Path not found")]
    PathNotFound,
    /// A reference chain or container expansion revisited a path
    #[error("Circular reference detected")]
    CircularReference,
    /// The delimiter could not be turned into a token pattern
    #[error("Invalid delimiter: {delimiter:?}")]
    InvalidDelimiter { delimiter: String },
}

impl Error {
    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            path: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            kind: ErrorKind::PathNotFound,
            path: Some(path_str.clone()),
            help: Some(format!("Check that '{}' exists in the document", path_str)),
            cause: None,
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(path: impl Into<String>, chain: Vec<String>) -> Self {
        let chain_str = chain.join(" → ");
        Self {
            kind: ErrorKind::CircularReference,
            path: Some(path.into()),
            help: Some("Break the circular dependency by removing one of the references".into()),
            cause: Some(format!("Chain: {}", chain_str)),
        }
    }

    /// Create an invalid delimiter error
    pub fn invalid_delimiter(delimiter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidDelimiter {
                delimiter: delimiter.into(),
            },
            path: None,
            help: Some("Use a short, non-empty delimiter such as '%' or '='".into()),
            cause: Some(message.into()),
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
