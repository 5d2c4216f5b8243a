//! YAML-flavored scalar reading. Path segments and evaluated key fragments
//! are plain text; this module decides what value that text denotes, the same
//! way a YAML loader would type an unquoted scalar. It deliberately knows
//! nothing about the engine's value model so it can be reused anywhere a
//! scalar needs typing.

/// A typed scalar, as produced by [parse_scalar]
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Read a piece of text as a YAML scalar: `5` is an integer, `true` is a
/// boolean, `foo` is a string. Two cases are special:
/// - `*` always stays the string `*`, because the wildcard marker must
///   survive coercion untouched
/// - quoted text unwraps to a string without any further typing, which is how
///   keys that would otherwise coerce (or that contain path syntax) are
///   escaped
pub fn parse_scalar(text: &str) -> Scalar {
    if text == "*" {
        return Scalar::Str("*".to_owned());
    }
    if let Some(inner) = unquote(text) {
        return Scalar::Str(inner);
    }
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Scalar::Null,
        "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" => {
            return Scalar::Bool(true);
        }
        "false" | "False" | "FALSE" | "no" | "No" | "NO" => {
            return Scalar::Bool(false);
        }
        ".inf" | "+.inf" | ".Inf" | "+.Inf" => {
            return Scalar::Float(f64::INFINITY);
        }
        "-.inf" | "-.Inf" => return Scalar::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" => return Scalar::Float(f64::NAN),
        _ => {}
    }
    if is_int_syntax(text) {
        // Digit runs that overflow i64 stay strings, the same way YAML
        // loaders without bigints fall back on huge plain scalars
        return match text.parse::<i64>() {
            Ok(i) => Scalar::Int(i),
            Err(_) => Scalar::Str(text.to_owned()),
        };
    }
    if is_float_syntax(text)
        && let Ok(f) = text.parse::<f64>()
    {
        return Scalar::Float(f);
    }
    Scalar::Str(text.to_owned())
}

/// If the text is wrapped in one matching pair of quote characters, strip
/// them. Double quotes process backslash escapes, single quotes keep their
/// content byte-for-byte (YAML semantics — which is what makes single quotes
/// the escape hatch for regex keys full of backslashes). Returns `None` for
/// anything else.
pub fn unquote(text: &str) -> Option<String> {
    let first = text.chars().next()?;
    if text.len() >= 2
        && (first == '"' || first == '\'')
        && text.ends_with(first)
    {
        let inner = &text[1..text.len() - 1];
        Some(if first == '"' {
            unescape(inner)
        } else {
            inner.to_owned()
        })
    } else {
        None
    }
}

/// Process backslash escape sequences. Unknown escapes collapse to the
/// escaped character itself, so `\'` and `\"` work without being special
pub fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// An optional sign followed by one or more digits
fn is_int_syntax(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// YAML core schema float: `[-+]? (digits [. digits?]? | . digits) exponent?`
/// where a dotless mantissa requires an exponent to count as a float
fn is_float_syntax(text: &str) -> bool {
    let rest = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match rest.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (rest, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some((whole, frac)) => {
            (!whole.is_empty() || !frac.is_empty())
                && whole.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => {
            exponent.is_some()
                && !mantissa.is_empty()
                && mantissa.bytes().all(|b| b.is_ascii_digit())
        }
    };
    let exponent_ok = exponent.is_none_or(|exponent| {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    });
    mantissa_ok && exponent_ok
}
