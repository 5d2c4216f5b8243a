//! Expression trees and their evaluation.
//!
//! The evaluator is a tiny interpreter over the parsed tree; nothing is
//! delegated to a host-language eval. Numeric operations follow standard
//! mixed int/float promotion, `in` is membership for sequences, mappings and
//! strings, and `|`/`&` over mappings mean union/intersection.

use crate::{
    error::Error,
    parse::Path,
    resolution::Resolution,
    value::{Key, Map, Value},
};
use std::{cmp::Ordering, fmt, sync::Arc};

/// A parsed expression
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    /// Sequence literal, possibly containing `*splat` items
    Seq(Vec<SeqItem>),
    /// Mapping literal, possibly containing `**splat` entries
    Map(Vec<MapEntry>),
    /// A variable reference, resolved through the navigation engine
    Path(Path),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Short-circuiting; yields the deciding operand, not a bool
    And(Box<Expr>, Box<Expr>),
    /// Short-circuiting; yields the deciding operand, not a bool
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `value if condition else fallback`; only the taken branch runs
    Cond {
        value: Box<Expr>,
        condition: Box<Expr>,
        fallback: Box<Expr>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SeqItem {
    Item(Expr),
    Splat(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum MapEntry {
    /// `key: value`; a missing value means null
    Entry { key: Expr, value: Option<Expr> },
    Splat(Expr),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum UnaryOp {
    Neg,
    Pos,
    Invert,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
}

impl Expr {
    /// Evaluate against the given navigation state. Variable paths resolve
    /// through the engine and come back fully evaluated, so recursion through
    /// templated values (e.g. `:.fac(n - 1)`) terminates here.
    pub(crate) fn eval(&self, scope: &Resolution) -> Result<Value, Error> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Path(path) => {
                let resolution = scope.resolve_path(path, true)?;
                Ok(resolution.data().cloned().unwrap_or_default())
            }
            Self::Seq(items) => {
                let mut seq = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        SeqItem::Item(expr) => seq.push(expr.eval(scope)?),
                        SeqItem::Splat(expr) => match expr.eval(scope)? {
                            Value::Seq(values) => {
                                seq.extend(values.iter().cloned());
                            }
                            other => {
                                return Err(Error::eval(
                                    "*",
                                    format!(
                                        "cannot splice a {} into a sequence",
                                        other.type_name()
                                    ),
                                ));
                            }
                        },
                    }
                }
                Ok(Value::Seq(Arc::new(seq)))
            }
            Self::Map(entries) => {
                let mut map = Map::new();
                for entry in entries {
                    match entry {
                        MapEntry::Entry { key, value } => {
                            let key_value = key.eval(scope)?;
                            let key = Key::for_value(&key_value)
                                .ok_or_else(|| {
                                    Error::eval(
                                        key_value.to_literal(),
                                        "not usable as a mapping key",
                                    )
                                })?;
                            let value = match value {
                                Some(expr) => expr.eval(scope)?,
                                None => Value::Null,
                            };
                            map.insert(key, value);
                        }
                        MapEntry::Splat(expr) => match expr.eval(scope)? {
                            Value::Map(entries) => {
                                for (key, value) in entries.iter() {
                                    map.insert(key.clone(), value.clone());
                                }
                            }
                            other => {
                                return Err(Error::eval(
                                    "**",
                                    format!(
                                        "cannot splice a {} into a mapping",
                                        other.type_name()
                                    ),
                                ));
                            }
                        },
                    }
                }
                Ok(map.into())
            }
            Self::Unary(op, operand) => unary(*op, &operand.eval(scope)?),
            Self::Binary(op, lhs, rhs) => {
                binary(*op, &lhs.eval(scope)?, &rhs.eval(scope)?)
            }
            Self::And(lhs, rhs) => {
                let value = lhs.eval(scope)?;
                if value.to_bool() { rhs.eval(scope) } else { Ok(value) }
            }
            Self::Or(lhs, rhs) => {
                let value = lhs.eval(scope)?;
                if value.to_bool() { Ok(value) } else { rhs.eval(scope) }
            }
            Self::Not(operand) => {
                Ok(Value::Bool(!operand.eval(scope)?.to_bool()))
            }
            Self::Cond {
                value,
                condition,
                fallback,
            } => {
                if condition.eval(scope)?.to_bool() {
                    value.eval(scope)
                } else {
                    fallback.eval(scope)
                }
            }
        }
    }
}

/// Both operands as numbers, promoted to float when mixed
enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numbers(a: &Value, b: &Value) -> Option<Numbers> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(Numbers::Ints(*a, *b)),
        (Value::Int(a), Value::Float(b)) => {
            Some(Numbers::Floats(*a as f64, *b))
        }
        (Value::Float(a), Value::Int(b)) => {
            Some(Numbers::Floats(*a, *b as f64))
        }
        (Value::Float(a), Value::Float(b)) => Some(Numbers::Floats(*a, *b)),
        _ => None,
    }
}

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, Error> {
    let result = match (op, operand) {
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int),
        (UnaryOp::Neg, Value::Float(f)) => Some(Value::Float(-f)),
        (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => {
            Some(operand.clone())
        }
        (UnaryOp::Invert, Value::Int(i)) => Some(Value::Int(!i)),
        _ => None,
    };
    result.ok_or_else(|| {
        Error::eval(
            op.to_string(),
            format!("unsupported operand type {}", operand.type_name()),
        )
    })
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    let mismatch = || {
        Error::eval(
            op.to_string(),
            format!(
                "unsupported operand types {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        )
    };
    let overflow = || Error::eval(op.to_string(), "integer overflow");
    let zero = || Error::eval(op.to_string(), "division by zero");

    match op {
        BinOp::Eq => Ok(Value::Bool(value_eq(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!value_eq(lhs, rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = order(lhs, rhs).ok_or_else(mismatch)?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::In => {
            Ok(Value::Bool(membership(lhs, rhs).ok_or_else(mismatch)?))
        }
        BinOp::NotIn => {
            Ok(Value::Bool(!membership(lhs, rhs).ok_or_else(mismatch)?))
        }
        BinOp::Add => match numbers(lhs, rhs) {
            Some(Numbers::Ints(a, b)) => {
                a.checked_add(b).map(Value::Int).ok_or_else(overflow)
            }
            Some(Numbers::Floats(a, b)) => Ok(Value::Float(a + b)),
            None => match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => {
                    Ok(Value::from(format!("{}{}", a.as_str(), b.as_str())))
                }
                (Value::Seq(a), Value::Seq(b)) => Ok(Value::Seq(Arc::new(
                    a.iter().chain(b.iter()).cloned().collect(),
                ))),
                _ => Err(mismatch()),
            },
        },
        BinOp::Sub => match numbers(lhs, rhs).ok_or_else(mismatch)? {
            Numbers::Ints(a, b) => {
                a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
            }
            Numbers::Floats(a, b) => Ok(Value::Float(a - b)),
        },
        BinOp::Mul => match numbers(lhs, rhs) {
            Some(Numbers::Ints(a, b)) => {
                a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
            }
            Some(Numbers::Floats(a, b)) => Ok(Value::Float(a * b)),
            None => match (lhs, rhs) {
                (Value::String(s), Value::Int(n))
                | (Value::Int(n), Value::String(s)) => {
                    Ok(repeat_str(s.as_str(), *n))
                }
                (Value::Seq(seq), Value::Int(n))
                | (Value::Int(n), Value::Seq(seq)) => Ok(repeat_seq(seq, *n)),
                _ => Err(mismatch()),
            },
        },
        // True division always yields a float
        BinOp::Div => match numbers(lhs, rhs).ok_or_else(mismatch)? {
            Numbers::Ints(_, 0) => Err(zero()),
            Numbers::Ints(a, b) => Ok(Value::Float(a as f64 / b as f64)),
            Numbers::Floats(_, b) if b == 0.0 => Err(zero()),
            Numbers::Floats(a, b) => Ok(Value::Float(a / b)),
        },
        BinOp::FloorDiv => match numbers(lhs, rhs).ok_or_else(mismatch)? {
            Numbers::Ints(_, 0) => Err(zero()),
            Numbers::Ints(a, b) => Ok(Value::Int(floor_div(a, b))),
            Numbers::Floats(_, b) if b == 0.0 => Err(zero()),
            Numbers::Floats(a, b) => Ok(Value::Float((a / b).floor())),
        },
        // The result takes the divisor's sign
        BinOp::Rem => match numbers(lhs, rhs).ok_or_else(mismatch)? {
            Numbers::Ints(_, 0) => Err(zero()),
            Numbers::Ints(a, b) => Ok(Value::Int(floor_mod(a, b))),
            Numbers::Floats(_, b) if b == 0.0 => Err(zero()),
            Numbers::Floats(a, b) => {
                Ok(Value::Float(a - b * (a / b).floor()))
            }
        },
        BinOp::Pow => match numbers(lhs, rhs).ok_or_else(mismatch)? {
            Numbers::Ints(a, b) if b >= 0 => u32::try_from(b)
                .ok()
                .and_then(|exponent| a.checked_pow(exponent))
                .map(Value::Int)
                .ok_or_else(overflow),
            Numbers::Ints(a, b) => {
                Ok(Value::Float((a as f64).powf(b as f64)))
            }
            Numbers::Floats(a, b) => Ok(Value::Float(a.powf(b))),
        },
        BinOp::BitOr => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a | b)),
            // Union; entries from the right side win
            (Value::Map(a), Value::Map(b)) => {
                let mut union = (**a).clone();
                for (key, value) in b.iter() {
                    union.insert(key.clone(), value.clone());
                }
                Ok(union.into())
            }
            _ => Err(mismatch()),
        },
        BinOp::BitXor => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a ^ b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a ^ b)),
            _ => Err(mismatch()),
        },
        BinOp::BitAnd => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a & b)),
            // Intersection; the left side's entries are kept
            (Value::Map(a), Value::Map(b)) => Ok(a
                .iter()
                .filter(|(key, _)| b.contains_key(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<Map>()
                .into()),
            _ => Err(mismatch()),
        },
        BinOp::Shl | BinOp::Shr => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if !(0..64).contains(b) {
                    return Err(Error::eval(
                        op.to_string(),
                        format!("shift count {b} out of range"),
                    ));
                }
                Ok(Value::Int(if op == BinOp::Shl { a << b } else { a >> b }))
            }
            _ => Err(mismatch()),
        },
    }
}

/// Equality with numeric cross-type comparison (`1 == 1.0`)
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
            (*i as f64) == *f
        }
        _ => a == b,
    }
}

/// Ordering for numbers (cross-type) and strings
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match numbers(a, b) {
        Some(Numbers::Ints(a, b)) => Some(a.cmp(&b)),
        Some(Numbers::Floats(a, b)) => a.partial_cmp(&b),
        None => match (a, b) {
            (Value::String(a), Value::String(b)) => {
                Some(a.as_str().cmp(b.as_str()))
            }
            _ => None,
        },
    }
}

/// `needle in haystack`: element of a sequence, key of a mapping, substring
/// of a string
fn membership(needle: &Value, haystack: &Value) -> Option<bool> {
    match haystack {
        Value::Seq(seq) => Some(seq.iter().any(|v| value_eq(v, needle))),
        Value::Map(map) => {
            Key::for_value(needle).map(|key| map.contains_key(&key))
        }
        Value::String(text) => {
            needle.as_str().map(|sub| text.as_str().contains(sub))
        }
        _ => None,
    }
}

/// Floor division with Python's rounding (toward negative infinity)
fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

/// Remainder with the divisor's sign
fn floor_mod(a: i64, b: i64) -> i64 {
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        remainder + b
    } else {
        remainder
    }
}

fn repeat_str(s: &str, count: i64) -> Value {
    if count <= 0 {
        Value::from("")
    } else {
        Value::from(s.repeat(count as usize))
    }
}

fn repeat_seq(seq: &[Value], count: i64) -> Value {
    if count <= 0 {
        Value::from(Vec::<Value>::new())
    } else {
        Value::Seq(Arc::new(
            seq.iter().cloned().cycle().take(seq.len() * count as usize).collect(),
        ))
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neg => "-",
            Self::Pos => "+",
            Self::Invert => "~",
        })
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Rem => "%",
            Self::Pow => "**",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_expression;
    use pretty_assertions::assert_eq;
    use quarry_util::assert_err;
    use rstest::rstest;

    /// Evaluate an expression against a small document and argument scope
    fn eval(source: &str) -> Result<Value, Error> {
        let document: Value = vec![("n", Value::from(5))].into();
        let arguments = Map::from_iter([(Key::from("m"), Value::from(2))]);
        let scope = Resolution::new(document, "doc", arguments);
        parse_expression(source)?.eval(&scope)
    }

    #[rstest]
    // Arithmetic and promotion
    #[case::add("1 + 2", 3.into())]
    #[case::add_mixed("1 + 0.5", 1.5.into())]
    #[case::precedence("1 + 2 * 3", 7.into())]
    #[case::parens("(1 + 2) * 3", 9.into())]
    #[case::true_division("1 / 2", 0.5.into())]
    #[case::floor_division("7 // 2", 3.into())]
    #[case::floor_division_negative("-7 // 2", (-4).into())]
    #[case::modulo("7 % 3", 1.into())]
    #[case::modulo_negative_divisor("7 % -3", (-2).into())]
    #[case::modulo_negative_dividend("-7 % 3", 2.into())]
    #[case::power("2 ** 10", 1024.into())]
    #[case::power_negative_exponent("2 ** -1", 0.5.into())]
    #[case::negation("-(1 + 2)", (-3).into())]
    #[case::invert("~5", (-6).into())]
    // Strings and sequences
    #[case::concat("'a' + 'b'", "ab".into())]
    #[case::repeat_string("'ab' * 3", "ababab".into())]
    #[case::concat_sequences("[1] + [2]", vec![1, 2].into())]
    #[case::splat("[*[1, 2], 3]", vec![1, 2, 3].into())]
    // Comparison
    #[case::eq_cross_type("1 == 1.0", true.into())]
    #[case::ne("1 != 2", true.into())]
    #[case::string_order("'a' < 'b'", true.into())]
    #[case::in_sequence("2 in [1, 2]", true.into())]
    #[case::not_in_sequence("3 not in [1, 2]", true.into())]
    #[case::in_string("'b' in 'abc'", true.into())]
    #[case::in_mapping("'x' in {x: 1}", true.into())]
    // Boolean operators yield the deciding operand
    #[case::and_truthy("1 and 2", 2.into())]
    #[case::and_falsy("0 and 2", 0.into())]
    #[case::or_falsy("0 or 'x'", "x".into())]
    #[case::not_empty("not []", true.into())]
    #[case::conditional("1 if yes else 2", 1.into())]
    #[case::conditional_fallback("1 if no else 2", 2.into())]
    // Bitwise and collections
    #[case::bit_or("5 | 2", 7.into())]
    #[case::bit_and("6 & 3", 2.into())]
    #[case::bit_xor("6 ^ 3", 5.into())]
    #[case::shift_left("1 << 4", 16.into())]
    #[case::shift_right("16 >> 2", 4.into())]
    #[case::map_union("{a: 1} | {a: 2, b: 3}", vec![("a", 2), ("b", 3)].into())]
    #[case::map_intersection(
        "{a: 1, b: 2} & {b: 9}",
        vec![("b", 2)].into(),
    )]
    #[case::map_splat("{**{a: 1, b: 2}, b: 20}", vec![("a", 1), ("b", 20)].into())]
    #[case::map_bare_key("{flag}", vec![("flag", Value::Null)].into())]
    // Variable paths: `:` anchors at the document, bare names at arguments
    #[case::document_path(":.n + 1", 6.into())]
    #[case::argument_path("m * 3", 6.into())]
    #[case::mixed_paths(":.n * m", 10.into())]
    fn test_eval(#[case] source: &str, #[case] expected: Value) {
        assert_eq!(eval(source).unwrap(), expected, "source: {source}");
    }

    #[rstest]
    #[case::division_by_zero("1 / 0", "division by zero")]
    #[case::floor_division_by_zero("1 // 0", "division by zero")]
    #[case::modulo_by_zero("1 % 0", "division by zero")]
    #[case::type_mismatch("1 + 'a'", "unsupported operand types")]
    #[case::bad_splat("[*1]", "cannot splice")]
    #[case::overflow("9223372036854775807 + 1", "integer overflow")]
    #[case::shift_range("1 << 64", "shift count")]
    #[case::unknown_argument("missing + 1", "No key")]
    fn test_eval_error(#[case] source: &str, #[case] message: &str) {
        assert_err!(eval(source), message);
    }
}
