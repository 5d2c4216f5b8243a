//! Navigate tree-structured documents with path expressions, bind arguments
//! to parameterised entries, and evaluate embedded `$(...)` expressions.
//! This engine is focused on resolution and evaluation, and is agnostic of
//! where documents come from; loading is the caller's business (the root
//! `quarry` crate provides a YAML convenience).
//!
//! The moving parts:
//! - [Value] is the document model: scalars, sequences, ordered mappings,
//!   plus the engine-internal batch and handle shapes
//! - [Resolution] is the immutable navigation state threaded through a query
//! - [Accessor] (or the [access] shorthand) is the caller-facing entry point
//!
//! ```
//! use quarry_engine::{Accessor, Value, access};
//!
//! let document: Value = vec![
//!     ("answer", Value::from(42)),
//!     // The quoted marker puts the string in template mode
//!     ("greeting", Value::quoted("Hello, $(name)!")),
//! ]
//! .into();
//! assert_eq!(access(&document, "answer").unwrap(), 42.into());
//!
//! let greeting = Accessor::new(&document)
//!     .argument("name", "World")
//!     .access("greeting")
//!     .unwrap();
//! assert_eq!(greeting, "Hello, World!".into());
//! ```

mod cereal;
mod display;
mod error;
mod evaluate;
mod expression;
mod navigate;
mod parse;
mod resolution;
#[cfg(test)]
mod tests;
mod value;

pub use cereal::InvalidKey;
pub use error::{Error, ParseError};
pub use resolution::Resolution;
pub use value::{Batch, Key, Map, Text, Value};

use quarry_util::ResultTraced;
use tracing::debug;

/// Access a (possibly nested) value in the document with the default
/// options: rooted at the document, fully evaluated, failures returned as
/// `Err`. Use [Accessor] when arguments, fallbacks, or validation are
/// needed.
pub fn access(document: &Value, path: &str) -> Result<Value, Error> {
    Accessor::new(document).access(path)
}

/// Validation applied to the final value of a query
pub enum Check {
    /// The value must be truthy
    Truthy,
    /// The value must be a non-empty sequence
    Sequence,
    /// The value must be a non-empty mapping
    Mapping,
    /// The predicate must return true
    Predicate(Box<dyn Fn(&Value) -> bool>),
}

/// What to do when a query fails and no fallback was supplied
#[derive(Default)]
pub enum ErrorMode {
    /// Return the error to the caller
    #[default]
    Raise,
    /// Invoke the callback with the error, then yield null
    Report(Box<dyn Fn(&Error)>),
    /// Silently yield null
    Ignore,
}

/// The caller-facing entry point: a document plus query options.
///
/// Paths resolve against the document root; `$(...)` splices inside the
/// resolved values see the configured arguments. Argument maps added with
/// [arguments](Self::arguments) merge first-wins; single arguments bound
/// with [argument](Self::argument) override them. (Inside the engine, scopes
/// added later during navigation win instead — capture-key bindings shadow
/// outer bindings. The asymmetry is intentional.)
///
/// A capture key whose bound value is a batch behaves as a reference: it is
/// resolved at its first use, not at binding time.
pub struct Accessor<'doc> {
    document: &'doc Value,
    name: String,
    positional: Vec<Map>,
    keywords: Map,
    evaluate_fully: bool,
    check: Option<Check>,
    fallback: Option<Value>,
    error_mode: ErrorMode,
}

impl<'doc> Accessor<'doc> {
    pub fn new(document: &'doc Value) -> Self {
        Self {
            document,
            name: "document".to_owned(),
            positional: Vec::new(),
            keywords: Map::new(),
            evaluate_fully: true,
            check: None,
            fallback: None,
            error_mode: ErrorMode::default(),
        }
    }

    /// Name the document; used as the first location label in error messages
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a positional argument map. Across several maps, the first
    /// occurrence of a key wins.
    #[must_use]
    pub fn arguments(mut self, arguments: Map) -> Self {
        self.positional.push(arguments);
        self
    }

    /// Bind a single argument. Named arguments override the positional maps.
    #[must_use]
    pub fn argument(
        mut self,
        key: impl Into<Key>,
        value: impl Into<Value>,
    ) -> Self {
        self.keywords.insert(key.into(), value.into());
        self
    }

    /// Whether to recursively expand every splice in the final value
    /// (default: true)
    #[must_use]
    pub fn evaluate_fully(mut self, evaluate_fully: bool) -> Self {
        self.evaluate_fully = evaluate_fully;
        self
    }

    /// Validate the final value before returning it
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    /// Return this value instead of reporting any failure
    #[must_use]
    pub fn fallback(mut self, value: impl Into<Value>) -> Self {
        self.fallback = Some(value.into());
        self
    }

    /// How to report failures when no fallback is set
    #[must_use]
    pub fn on_error(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Resolve a path against the document and return the final value
    pub fn access(&self, path: &str) -> Result<Value, Error> {
        debug!(name = %self.name, path, "accessing path");
        match self.try_access(path).traced() {
            Ok(value) => Ok(value),
            Err(error) => {
                // A fallback short-circuits error reporting entirely
                if let Some(fallback) = &self.fallback {
                    return Ok(fallback.clone());
                }
                match &self.error_mode {
                    ErrorMode::Raise => Err(error),
                    ErrorMode::Report(report) => {
                        report(&error);
                        Ok(Value::Null)
                    }
                    ErrorMode::Ignore => Ok(Value::Null),
                }
            }
        }
    }

    fn try_access(&self, path: &str) -> Result<Value, Error> {
        let resolution = Resolution::new(
            self.document.clone(),
            &self.name,
            self.merged_arguments(),
        )
        // Always anchored at the document root
        .resolve_str(&format!(":{path}"), self.evaluate_fully)?;
        // Engine-internal shapes never leak to callers
        let value = resolution
            .finalize(true)
            .data()
            .cloned()
            .unwrap_or_default();
        self.apply_check(path, value)
    }

    fn merged_arguments(&self) -> Map {
        let mut merged = Map::new();
        // Reversed insertion makes the first occurrence win
        for map in self.positional.iter().rev() {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &self.keywords {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    fn apply_check(&self, path: &str, value: Value) -> Result<Value, Error> {
        let Some(check) = &self.check else {
            return Ok(value);
        };
        let reason = match check {
            Check::Truthy if !value.to_bool() => {
                Some("expected a non-empty value")
            }
            Check::Sequence
                if !matches!(&value, Value::Seq(s) if !s.is_empty()) =>
            {
                Some("expected a non-empty sequence")
            }
            Check::Mapping
                if !matches!(&value, Value::Map(m) if !m.is_empty()) =>
            {
                Some("expected a non-empty mapping")
            }
            Check::Predicate(predicate) if !predicate(&value) => {
                Some("the predicate returned false")
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(Error::CheckFailed {
                path: format!("{}.{}", self.name, path),
                value,
                reason,
            }),
            None => Ok(value),
        }
    }
}
