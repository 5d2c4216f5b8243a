//! Value stringification: the human-facing [Display] form used when splices
//! are stringified into surrounding text, and the re-parseable literal form
//! used when evaluated values are injected back into composed expressions.

use crate::value::{Key, Value};
use itertools::Itertools;
use std::fmt::{self, Display, Write};

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(float) => write!(f, "{float}"),
            // Top-level strings print bare; strings inside containers are
            // quoted by the literal form below
            Self::String(text) => write!(f, "{}", text.as_str()),
            Self::Seq(_)
            | Self::Map(_)
            | Self::Batch(_)
            | Self::Handle(_) => {
                write!(f, "{}", self.to_literal())
            }
        }
    }
}

impl Value {
    /// Render the value as expression source that parses back to an equal
    /// value: strings quoted and escaped, containers in literal syntax.
    /// Engine-internal shapes collapse to what they resolve to.
    pub fn to_literal(&self) -> String {
        let mut buf = String::new();
        self.write_literal(&mut buf);
        buf
    }

    fn write_literal(&self, buf: &mut String) {
        match self {
            Self::Null => buf.push_str("null"),
            Self::Bool(b) => {
                buf.push_str(if *b { "true" } else { "false" });
            }
            Self::Int(i) => {
                let _ = write!(buf, "{i}");
            }
            Self::Float(f) => write_float_literal(*f, buf),
            Self::String(text) => write_quoted(text.as_str(), buf),
            Self::Seq(seq) => {
                buf.push('[');
                for (i, element) in seq.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    element.write_literal(buf);
                }
                buf.push(']');
            }
            Self::Map(map) => {
                buf.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    key.to_value().write_literal(buf);
                    buf.push_str(": ");
                    value.write_literal(buf);
                }
                buf.push('}');
            }
            Self::Batch(batch) => {
                Value::from(batch.results()).write_literal(buf);
            }
            Self::Handle(resolution) => resolution
                .data()
                .cloned()
                .unwrap_or_default()
                .write_literal(buf),
        }
    }
}

/// Floats keep a decimal point (or exponent) so they re-parse as floats.
/// Non-finite values have no literal syntax; an overflowing exponent stands
/// in for the infinities.
fn write_float_literal(f: f64, buf: &mut String) {
    if f.is_nan() {
        buf.push_str("null");
    } else if f.is_infinite() {
        buf.push_str(if f < 0.0 { "-1e999" } else { "1e999" });
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        let _ = write!(buf, "{f:.1}");
    } else {
        let _ = write!(buf, "{f}");
    }
}

fn write_quoted(text: &str, buf: &mut String) {
    buf.push('\'');
    for c in text.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\'' => buf.push_str("\\'"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            other => buf.push(other),
        }
    }
    buf.push('\'');
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Seq(keys) => {
                write!(f, "[{}]", keys.iter().format(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::null(Value::Null, "null")]
    #[case::bool(true.into(), "true")]
    #[case::int(42.into(), "42")]
    #[case::string("hi".into(), "hi")]
    #[case::seq(vec![1, 2].into(), "[1, 2]")]
    #[case::map(vec![("a", Value::from("x"))].into(), "{a: 'x'}")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[rstest]
    #[case::string("it's".into(), r"'it\'s'")]
    #[case::float_whole(3.0.into(), "3.0")]
    #[case::float(1.5.into(), "1.5")]
    #[case::nested(
        vec![Value::from(vec!["a"]), "b".into()].into(),
        "[['a'], 'b']"
    )]
    fn test_to_literal(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_literal(), expected);
    }

    /// Literal forms parse back to the value they came from
    #[rstest]
    #[case::int(5.into())]
    #[case::float(2.5.into())]
    #[case::float_whole(3.0.into())]
    #[case::string("a 'quoted' \\ string\n".into())]
    #[case::seq(vec![Value::from(1), "x".into(), Value::Null].into())]
    #[case::map(vec![("k", Value::from(vec![1, 2]))].into())]
    fn test_literal_round_trip(#[case] value: Value) {
        use crate::{parse, resolution::Resolution, value::Map};
        let literal = value.to_literal();
        let scope = Resolution::new(Value::Null, "doc", Map::new());
        let parsed = parse::parse_expression(&literal)
            .unwrap()
            .eval(&scope)
            .unwrap();
        assert_eq!(parsed, value, "literal: {literal}");
    }
}
