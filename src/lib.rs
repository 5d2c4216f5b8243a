//! Quarry is a templated configuration query engine. Point it at a
//! tree-structured document (usually loaded from YAML), give it a path
//! expression and an optional argument environment, and it navigates the
//! tree, binds arguments to parameterised entries, and evaluates embedded
//! `$(...)` expressions into a final value.
//!
//! ```
//! use quarry::{access, load_str};
//!
//! let document =
//!     load_str("greetings:\n  $name: '\"Hello, $(name)!\"'").unwrap();
//! let value = access(&document, "greetings.World").unwrap();
//! assert_eq!(value, "Hello, World!".into());
//! ```
//!
//! The engine itself lives in `quarry_engine`; this crate re-exports its
//! public API and adds the YAML loading convenience.

pub use quarry_engine::{
    Accessor, Batch, Check, Error, ErrorMode, InvalidKey, Key, Map,
    ParseError, Resolution, Text, Value, access,
};

use thiserror::Error;

/// An error while loading a document from YAML text
#[derive(Debug, Error)]
pub enum LoadError {
    /// The text is not valid YAML
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    /// The YAML uses a mapping key the value model cannot represent
    #[error(transparent)]
    Key(#[from] InvalidKey),
}

/// Load a document from YAML text.
///
/// serde_yaml does not report scalar quote style, so no string arrives with
/// the quoted-scalar marker set. To put a string into template (string)
/// mode, wrap it in an extra pair of quotes — `'"Hello, $(name)!"'` — or
/// build the document with [Value::quoted]. Unquoted strings are bare
/// expressions, which is usually what configuration templates want anyway.
pub fn load_str(yaml: &str) -> Result<Value, LoadError> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    Ok(Value::from_yaml(&parsed)?)
}
