//! Conversions between the engine's value model and serde value trees.
//! Documents usually arrive through a YAML loader and results often leave as
//! JSON, so both directions live here.

use crate::value::{Key, Map, Value};
use thiserror::Error;

/// A document key the value model cannot represent (floats and containers
/// other than sequences are not hashable keys)
#[derive(Debug, Error)]
#[error("cannot use {0} as a mapping key")]
pub struct InvalidKey(String);

impl Value {
    /// Convert a YAML tree to a document value. serde_yaml does not report
    /// scalar quote style, so every string arrives without the
    /// quoted-scalar marker; strings that need string-mode expansion can
    /// wrap themselves in quotes instead.
    pub fn from_yaml(yaml: &serde_yaml::Value) -> Result<Self, InvalidKey> {
        match yaml {
            serde_yaml::Value::Null => Ok(Self::Null),
            serde_yaml::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_yaml::Value::Number(number) => Ok(yaml_number(number)),
            serde_yaml::Value::String(s) => Ok(Self::from(s.as_str())),
            serde_yaml::Value::Sequence(elements) => Ok(elements
                .iter()
                .map(Self::from_yaml)
                .collect::<Result<Vec<_>, _>>()?
                .into()),
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = Map::with_capacity(mapping.len());
                for (key, value) in mapping {
                    map.insert(yaml_key(key)?, Self::from_yaml(value)?);
                }
                Ok(map.into())
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    /// Convert a JSON value to a document value. This is infallible because
    /// [Value] is a superset of JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(number) => {
                if let Some(i) = number.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = number.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Null
                }
            }
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(elements) => elements
                .into_iter()
                .map(Self::from_json)
                .collect::<Vec<_>>()
                .into(),
            serde_json::Value::Object(entries) => entries
                .into_iter()
                .map(|(key, value)| (Key::Str(key), Self::from_json(value)))
                .collect::<Map>()
                .into(),
        }
    }

    /// Convert to JSON. Engine-internal shapes collapse to what they resolve
    /// to; non-string keys stringify; non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => (*b).into(),
            Self::Int(i) => (*i).into(),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(text) => text.as_str().into(),
            Self::Seq(elements) => {
                elements.iter().map(Self::to_json).collect()
            }
            Self::Map(map) => map
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_json()))
                .collect::<serde_json::Map<String, serde_json::Value>>()
                .into(),
            Self::Batch(batch) => {
                batch.results().iter().map(Self::to_json).collect()
            }
            Self::Handle(resolution) => resolution
                .data()
                .map(Self::to_json)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(json)
    }
}

fn yaml_number(number: &serde_yaml::Number) -> Value {
    if let Some(i) = number.as_i64() {
        Value::Int(i)
    } else if let Some(f) = number.as_f64() {
        Value::Float(f)
    } else {
        Value::Null
    }
}

fn yaml_key(yaml: &serde_yaml::Value) -> Result<Key, InvalidKey> {
    match yaml {
        serde_yaml::Value::Null => Ok(Key::Null),
        serde_yaml::Value::Bool(b) => Ok(Key::Bool(*b)),
        serde_yaml::Value::Number(number) => number
            .as_i64()
            .map(Key::Int)
            .ok_or_else(|| InvalidKey(format!("{number}"))),
        serde_yaml::Value::String(s) => Ok(Key::Str(s.clone())),
        serde_yaml::Value::Sequence(elements) => Ok(Key::Seq(
            elements
                .iter()
                .map(yaml_key)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        other => Err(InvalidKey(format!("{other:?}"))),
    }
}
