use crate::value::Value;
use thiserror::Error;
use winnow::error::ContextError;

/// An error while parsing a path or expression. The message is provided by
/// winnow
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(pub(crate) String);

/// Convert winnow's error type into ours. This stringifies the error so we
/// can drop the reference to the input
impl From<winnow::error::ParseError<&str, ContextError>> for ParseError {
    fn from(error: winnow::error::ParseError<&str, ContextError>) -> Self {
        Self(error.to_string())
    }
}

/// Any error that can occur while resolving a path or evaluating an
/// expression.
///
/// The error always holds owned data so it can be detached from the lifetime
/// of the document and the navigation state. This requires a mild amount of
/// cloning in error cases, but those should be infrequent so it's fine.
///
/// Failures inside a multiplexed step are not errors: those branches are
/// silently dropped. Only a failure on the main navigation line surfaces as
/// one of these.
#[derive(Debug, Error)]
pub enum Error {
    /// Key missing from a mapping (or the cursor is null) and no capture key
    /// applies
    #[error("No key `{key}` in `{location}`")]
    NoSuchKey { key: String, location: String },

    /// Integer key outside the bounds of a sequence
    #[error(
        "Index `{index}` is out of range for sequence `{location}` of \
        length {len}"
    )]
    IndexOutOfRange {
        index: i64,
        len: usize,
        location: String,
    },

    /// The cursor shape has no indirection rule for this key shape
    #[error("Cannot access key `{key}` in `{location}`, a {actual}")]
    CannotAccess {
        key: String,
        location: String,
        actual: &'static str,
    },

    /// More than one capture key in the same mapping
    #[error("More than one capture key in `{location}`: {keys}")]
    AmbiguousCapture { keys: String, location: String },

    /// Upward navigation requested at the root
    #[error("Cannot navigate upwards from `{location}`, it is already the root")]
    UpwardFromRoot { location: String },

    /// A regex-shaped key failed to compile
    #[error("Key `{pattern}` is not a valid regular expression: {source}")]
    BadRegex {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    /// Malformed path or expression
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An expression body failed at evaluation time (division by zero, type
    /// mismatch, ...)
    #[error("Error while evaluating expression `{expression}`: {reason}")]
    Eval { expression: String, reason: String },

    /// The final value did not pass the caller's check
    #[error("Value at `{path}` = {value} is not valid: {reason}")]
    CheckFailed {
        path: String,
        value: Value,
        reason: &'static str,
    },
}

impl Error {
    /// Shorthand for an evaluation error
    pub(crate) fn eval(
        expression: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Eval {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}
