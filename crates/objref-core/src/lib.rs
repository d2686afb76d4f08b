//! objref-core: reference interpolation for nested documents
//!
//! String leaves of a document may point at other parts of the same
//! document with delimited tokens such as `%database.host%`. Parsing the
//! document replaces those tokens with the values they point at.
//!
//! # Example
//!
//! ```rust
//! use objref_core::{create, OptionsUpdate, Value};
//!
//! let yaml = r#"
//! cwd: /srv/app
//! logs: "%cwd%/logs"
//! database:
//!   port: 5432
//! port: "%database.port%"
//! "#;
//!
//! let mut document = Value::from_yaml(yaml).unwrap();
//! create(OptionsUpdate::new()).unwrap().parse(&mut document).unwrap();
//!
//! assert_eq!(document.lookup("logs").unwrap().as_str(), Some("/srv/app/logs"));
//! assert_eq!(document.lookup("port").unwrap().as_i64(), Some(5432));
//! ```

pub mod error;
pub mod options;
pub mod resolver;
pub mod tokenizer;
pub mod value;

mod engine;

pub use engine::{create, Engine};
pub use error::{Error, ErrorKind, Result};
pub use options::{Options, OptionsUpdate};
pub use resolver::{Resolved, Resolver, Substitution};
pub use tokenizer::{Reference, Tokenizer};
pub use value::{PathSegment, Value};
