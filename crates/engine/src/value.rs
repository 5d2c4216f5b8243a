//! The tagged value universe the engine navigates: everything a document can
//! hold, plus the two engine-internal shapes ([Batch] and [Value::Handle])
//! that only exist while a query is in flight.

use crate::resolution::Resolution;
use indexmap::IndexMap;
use quarry_util::scalar::Scalar;
use std::sync::Arc;

/// An ordered mapping. Keys are scalars (commonly strings); iteration order
/// is the document order, which the engine is required to preserve through
/// wildcards and multiplexing.
pub type Map = IndexMap<Key, Value>;

/// A document value. Containers are `Arc`-backed so that cloning a value —
/// which the navigation stack does constantly — shares the subtree instead of
/// copying it. The document is read-only throughout a query, so sharing is
/// safe.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Text),
    Seq(Arc<Vec<Value>>),
    Map(Arc<Map>),
    /// A multiplexed cursor: one branch per matched entry. Engine-internal;
    /// the facade collapses batches to sequences before returning
    Batch(Batch),
    /// A reference to another point of navigation, produced by capture-key
    /// bindings whose key came from an evaluated expression. Unwrapped
    /// transparently during navigation
    Handle(Arc<Resolution>),
}

impl Value {
    /// Convert this value to a boolean, according to its truthiness.
    /// Truthiness/falsiness is defined for each type as:
    /// - `null` - `false`
    /// - `bool` - Own value
    /// - `int` - `false` if zero
    /// - `float` - `false` if zero
    /// - `string` - `false` if empty
    /// - `seq` - `false` if empty
    /// - `map` - `false` if empty
    ///
    /// These correspond to the truthiness rules from Python.
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(text) => !text.as_str().is_empty(),
            Self::Seq(seq) => !seq.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Batch(batch) => !batch.is_empty(),
            Self::Handle(resolution) => {
                resolution.data().is_some_and(Self::to_bool)
            }
        }
    }

    /// A short name for the value's shape, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "mapping",
            Self::Batch(_) => "batch",
            Self::Handle(_) => "reference",
        }
    }

    /// Shorthand for a string value carrying the quoted-scalar marker, i.e.
    /// one that came from a double-quoted source scalar
    pub fn quoted(text: impl Into<Arc<str>>) -> Self {
        Self::String(Text::quoted(text))
    }

    /// The string content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Equality ignores the quoted-scalar marker on strings (it's expansion
/// metadata, not part of the value) and compares the engine-internal shapes
/// by their underlying results
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Batch(a), Self::Batch(b)) => a.results() == b.results(),
            (Self::Handle(a), Self::Handle(b)) => a.data() == b.data(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::String(Text::new(text))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::String(Text::new(text))
    }
}

impl From<Text> for Value {
    fn from(text: Text) -> Self {
        Self::String(text)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Map(Arc::new(map))
    }
}

impl From<Batch> for Value {
    fn from(batch: Batch) -> Self {
        Self::Batch(batch)
    }
}

impl<T> From<Vec<T>> for Value
where
    Value: From<T>,
{
    fn from(seq: Vec<T>) -> Self {
        Self::Seq(Arc::new(seq.into_iter().map(Self::from).collect()))
    }
}

/// Build a mapping from (key, value) pairs
impl<K, V> From<Vec<(K, V)>> for Value
where
    Key: From<K>,
    Value: From<V>,
{
    fn from(entries: Vec<(K, V)>) -> Self {
        entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Map>()
            .into()
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => Self::Null,
            Scalar::Bool(b) => Self::Bool(b),
            Scalar::Int(i) => Self::Int(i),
            Scalar::Float(f) => Self::Float(f),
            Scalar::Str(s) => Self::String(Text::new(s)),
        }
    }
}

/// A string value together with the loader's quoted-scalar marker. The marker
/// records whether the source syntax was a double-quoted scalar, which
/// controls expansion semantics: quoted strings splice `$(...)` results into
/// the surrounding text, unquoted strings are bare expressions.
#[derive(Clone, Debug, Default, derive_more::Deref)]
pub struct Text {
    #[deref(forward)]
    text: Arc<str>,
    quoted: bool,
}

impl Text {
    /// A plain (unquoted) string
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    /// A string carrying the quoted-scalar marker
    pub fn quoted(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Was the source scalar double-quoted?
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

/// The marker doesn't participate in equality
impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A mapping key. Keys are hashable scalars; sequences of scalars are allowed
/// so that evaluated sequence keys can be looked up (the equivalent of tuple
/// keys). Floats are not keys.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Seq(Vec<Key>),
}

impl Key {
    /// Convert a value to a key, if it has a hashable shape
    pub fn for_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(i) => Some(Self::Int(*i)),
            Value::String(text) => Some(Self::Str(text.as_str().to_owned())),
            Value::Seq(seq) => {
                seq.iter().map(Self::for_value).collect::<Option<_>>().map(Self::Seq)
            }
            Value::Float(_)
            | Value::Map(_)
            | Value::Batch(_)
            | Value::Handle(_) => None,
        }
    }

    /// The key as a document value
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Str(s) => Value::from(s.as_str()),
            Self::Seq(keys) => Value::Seq(Arc::new(
                keys.iter().map(Self::to_value).collect(),
            )),
        }
    }

    /// The string content, if this is a string key
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An ordered bundle of independent [Resolution]s, one per branch of a
/// multiplexed navigation. A batch is itself a first-class cursor: subsequent
/// steps fan out over the branches transparently. Branch order follows the
/// iteration order of the container that produced the batch.
#[derive(Clone, Debug)]
pub struct Batch(Arc<Vec<Resolution>>);

impl Batch {
    pub(crate) fn new(branches: Vec<Resolution>) -> Self {
        Self(Arc::new(branches))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn branches(&self) -> &[Resolution] {
        &self.0
    }

    /// The cursor value of each branch, in order
    pub fn results(&self) -> Vec<Value> {
        self.0
            .iter()
            .map(|branch| branch.data().cloned().unwrap_or_default())
            .collect()
    }
}
