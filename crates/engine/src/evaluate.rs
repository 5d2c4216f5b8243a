//! Splice expansion: finding `$(...)` groups inside string values,
//! resolving their bodies through the navigation engine, and combining
//! verbatim and expanded fragments into a final value.
//!
//! A string is expanded in one of two modes. In string-mode (the source
//! scalar was double-quoted, or the text wraps itself in one matching pair
//! of quotes) splice results are stringified into the surrounding text. In
//! bare-mode the string is an expression: a lone splice keeps its resolved
//! value's type, and a mix of fragments is composed into expression source
//! and evaluated.

use crate::{
    error::Error,
    navigate::is_capture_key,
    parse::{self, balanced_group},
    resolution::Resolution,
    value::{Batch, Key, Map, Value},
};
use std::sync::Arc;

/// Outcome of evaluating a key's text
#[derive(Debug)]
pub(crate) enum Evaluated {
    /// The key evaluated to a plain value; capture keys bind it by value
    Plain(Value),
    /// The key was evaluated through the engine; capture keys bind it by
    /// reference so it keeps its original context
    Resolved(Resolution),
}

/// One fragment of a scanned string
enum Token {
    Verbatim(String),
    Expanded(Resolution),
}

/// Post-processed outcome of expanding a piece of text
enum Expansion {
    /// No fragments at all (empty or all-whitespace bare text)
    Null,
    /// String-mode concatenation
    Text(String),
    /// Bare-mode single verbatim fragment: the string, unchanged
    Verbatim(String),
    /// Bare-mode single splice: the resolution itself, so the caller keeps
    /// its context and its value's type
    Single(Resolution),
    /// Bare-mode multi-fragment expression result
    Value(Value),
}

impl Resolution {
    /// Expand splices in the cursor value. With `full`, recurse into
    /// sequences, mappings, and batch branches so no template survives
    /// anywhere in the result.
    pub(crate) fn evaluate(&self, full: bool) -> Result<Resolution, Error> {
        let Some(cursor) = self.data().cloned() else {
            return Ok(self.clone());
        };
        match cursor {
            Value::String(text) if !text.as_str().is_empty() => {
                match self.expand_text(text.as_str(), text.is_quoted())? {
                    Expansion::Null => Ok(self.set(Value::Null)),
                    Expansion::Text(out) | Expansion::Verbatim(out) => {
                        Ok(self.set(Value::from(out)))
                    }
                    Expansion::Single(resolution) => {
                        if full {
                            resolution.evaluate(true)
                        } else {
                            Ok(resolution)
                        }
                    }
                    Expansion::Value(value) => Ok(self.set(value)),
                }
            }
            Value::Map(map) => self.evaluate_map(&map, full),
            Value::Seq(seq) if full => {
                let mut result = Vec::with_capacity(seq.len());
                for (i, element) in seq.iter().enumerate() {
                    let element = self
                        .push(element.clone(), i.to_string(), Map::new())
                        .evaluate(true)?
                        .finalize(true);
                    result.push(element.data().cloned().unwrap_or_default());
                }
                Ok(self.set(Value::Seq(Arc::new(result))))
            }
            Value::Batch(batch) if full => {
                let branches = batch
                    .branches()
                    .iter()
                    .map(|branch| branch.evaluate(true))
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok(self.set(Value::Batch(Batch::new(branches))))
            }
            // A handle cursor is somebody else's definition; expand it in
            // its own context
            Value::Handle(_) if full => self.finalize(false).evaluate(true),
            _ => Ok(self.clone()),
        }
    }

    /// Expand a key's text instead of the cursor. A single-splice text comes
    /// back as the splice's resolution so capture keys can bind it by
    /// reference.
    pub(crate) fn evaluate_text(
        &self,
        text: &str,
    ) -> Result<Evaluated, Error> {
        Ok(match self.expand_text(text, false)? {
            Expansion::Null => Evaluated::Plain(Value::Null),
            Expansion::Text(out) | Expansion::Verbatim(out) => {
                Evaluated::Plain(Value::from(out))
            }
            Expansion::Single(resolution) => Evaluated::Resolved(resolution),
            Expansion::Value(value) => Evaluated::Plain(value),
        })
    }

    /// Mapping evaluation. `**` merge entries are spliced in place even in
    /// shallow mode, so navigation into merged entries works; entry order
    /// decides overrides, so explicit keys listed after the merge win.
    fn evaluate_map(&self, map: &Map, full: bool) -> Result<Resolution, Error> {
        let merge_key = Key::from("**");
        if !full && !map.contains_key(&merge_key) {
            return Ok(self.clone());
        }

        let mut merged = Map::with_capacity(map.len());
        for (key, value) in map {
            if *key == merge_key {
                let spliced = self
                    .push(value.clone(), "**", Map::new())
                    .evaluate(false)?
                    .finalize(true);
                match spliced.data() {
                    Some(Value::Map(entries)) => {
                        for (k, v) in entries.iter() {
                            merged.insert(k.clone(), v.clone());
                        }
                    }
                    other => {
                        return Err(Error::eval(
                            "**",
                            format!(
                                "merge value is not a mapping, got {}",
                                other.map_or("null", Value::type_name)
                            ),
                        ));
                    }
                }
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        if !full {
            return Ok(self.set(merged.into()));
        }

        let mut result = Map::with_capacity(merged.len());
        for (key, value) in &merged {
            // String keys can contain splices too. Capture keys are left
            // untouched: they are binders, not templates.
            let key = match key.as_str() {
                Some(text) if text.contains('$') && !is_capture_key(text) => {
                    let expanded = match self.evaluate_text(text)? {
                        Evaluated::Plain(value) => value,
                        Evaluated::Resolved(resolution) => resolution
                            .evaluate(true)?
                            .finalize(true)
                            .data()
                            .cloned()
                            .unwrap_or_default(),
                    };
                    Key::for_value(&expanded).ok_or_else(|| {
                        Error::eval(
                            text,
                            "key did not expand to a hashable value",
                        )
                    })?
                }
                _ => key.clone(),
            };
            let value = self
                .push(value.clone(), key.to_string(), Map::new())
                .evaluate(true)?
                .finalize(true)
                .data()
                .cloned()
                .unwrap_or_default();
            result.insert(key, value);
        }
        Ok(self.set(result.into()))
    }

    /// Scan a piece of text and post-process the fragments according to the
    /// expansion mode
    fn expand_text(
        &self,
        raw: &str,
        quoted: bool,
    ) -> Result<Expansion, Error> {
        let (text, string_mode) = if quoted {
            (raw, true)
        } else if let Some(inner) = outer_quotes(raw) {
            (inner, true)
        } else {
            (raw, false)
        };

        let mut tokens = self.scan(text, string_mode)?;
        if tokens.is_empty() {
            return Ok(Expansion::Null);
        }

        if string_mode {
            // Stringify each splice into the surrounding text
            let mut out = String::new();
            for token in tokens {
                match token {
                    Token::Verbatim(text) => out.push_str(&text),
                    Token::Expanded(resolution) => {
                        let value = resolution
                            .evaluate(true)?
                            .finalize(true)
                            .data()
                            .cloned()
                            .unwrap_or_default();
                        out.push_str(&value.to_string());
                    }
                }
            }
            return Ok(Expansion::Text(out));
        }

        if tokens.len() == 1 {
            let Some(token) = tokens.pop() else {
                // Checked length above
                unreachable!()
            };
            return Ok(match token {
                Token::Verbatim(text) => Expansion::Verbatim(text),
                Token::Expanded(resolution) => Expansion::Single(resolution),
            });
        }

        // Compose the fragments into one expression: verbatim fragments as
        // source text, expanded fragments as literals of their fully
        // evaluated values
        let mut source = String::new();
        for token in tokens {
            match token {
                Token::Verbatim(text) => {
                    source.push_str(&text);
                    source.push(' ');
                }
                Token::Expanded(resolution) => {
                    let value = resolution
                        .evaluate(true)?
                        .finalize(true)
                        .data()
                        .cloned()
                        .unwrap_or_default();
                    source.push_str(&value.to_literal());
                    source.push(' ');
                }
            }
        }
        let source = source.trim_end();
        let expr = parse::parse_expression(source)
            .map_err(|error| Error::eval(source, error.to_string()))?;
        Ok(Expansion::Value(expr.eval(self)?))
    }

    /// Split text into verbatim fragments and resolved splices. In
    /// bare-mode, verbatim fragments are trimmed and dropped when blank.
    fn scan(
        &self,
        text: &str,
        string_mode: bool,
    ) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();
        let mut verbatim = String::new();
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            let after = &rest[pos + 1..];
            // `$(body)` in both modes, `$dotted.path` in bare-mode only
            let splice = if let Some((body, consumed)) = balanced_group(after)
            {
                Some((body, 1 + consumed, false))
            } else if !string_mode
                && after.chars().next().is_some_and(is_short_form_start)
            {
                let len = path_run(after);
                (len > 0).then(|| (&after[..len], 1 + len, true))
            } else {
                None
            };

            match splice {
                Some((body, consumed, path_only)) => {
                    verbatim.push_str(&rest[..pos]);
                    flush(&mut verbatim, &mut tokens, string_mode);
                    let resolution = if path_only {
                        self.resolve_splice_path(body)?
                    } else {
                        self.resolve_splice(body)?
                    };
                    tokens.push(Token::Expanded(resolution));
                    rest = &rest[pos + consumed..];
                }
                None => {
                    // Not a splice; the $ is ordinary text
                    verbatim.push_str(&rest[..pos + 1]);
                    rest = &rest[pos + 1..];
                }
            }
        }
        verbatim.push_str(rest);
        flush(&mut verbatim, &mut tokens, string_mode);
        Ok(tokens)
    }

    /// Resolve one `$(...)` splice body: try it as a path first; if parsing
    /// or resolution fails, evaluate it as an expression (whose own path
    /// atoms recurse back into navigation)
    fn resolve_splice(&self, body: &str) -> Result<Resolution, Error> {
        let body = body.trim();
        if let Ok(path) = parse::parse_path(body)
            && let Ok(resolution) = self.resolve_path(&path, false)
        {
            return Ok(resolution);
        }
        let expr = parse::parse_expression(body)?;
        let value = expr.eval(self)?;
        Ok(self.set(value))
    }

    /// A short-form `$path` splice is a path only
    fn resolve_splice_path(&self, body: &str) -> Result<Resolution, Error> {
        let path = parse::parse_path(body.trim())?;
        self.resolve_path(&path, false)
    }
}

/// Move the pending verbatim text into the token list
fn flush(verbatim: &mut String, tokens: &mut Vec<Token>, string_mode: bool) {
    let fragment = if string_mode {
        verbatim.clone()
    } else {
        verbatim.trim().to_owned()
    };
    if !fragment.is_empty() {
        tokens.push(Token::Verbatim(fragment));
    }
    verbatim.clear();
}

/// Matching outer quote pair: both ends the same quote character
fn outer_quotes(text: &str) -> Option<&str> {
    let first = text.chars().next()?;
    (text.len() >= 2
        && (first == '"' || first == '\'')
        && text.ends_with(first))
    .then(|| &text[1..text.len() - 1])
}

/// Can this character start a short-form `$path` splice?
fn is_short_form_start(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Length of a short-form path body: path characters plus balanced groups
/// and quoted strings, stopping at the first space or operator
fn path_run(text: &str) -> usize {
    let mut len = 0;
    while len < text.len() {
        let rest = &text[len..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c == '(' {
            match balanced_group(rest) {
                Some((_, consumed)) => len += consumed,
                None => break,
            }
        } else if c == '\'' || c == '"' {
            match quoted_run(rest) {
                Some(consumed) => len += consumed,
                None => break,
            }
        } else if c.is_alphanumeric()
            || matches!(c, '_' | '-' | '.' | ':' | '$' | '*')
        {
            len += c.len_utf8();
        } else {
            break;
        }
    }
    len
}

/// Length of a quoted run starting at the opening quote, escapes included
fn quoted_run(text: &str) -> Option<usize> {
    let quote = text.chars().next()?;
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(i + quote.len_utf8());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Evaluate a bare template against a document and arguments
    fn expand(template: &str) -> Value {
        let document: Value = vec![
            ("n", Value::from(5)),
            ("s", "text".into()),
            ("template", template.into()),
        ]
        .into();
        let arguments =
            Map::from_iter([(Key::from("who"), Value::from("World"))]);
        Resolution::new(document, "doc", arguments)
            .resolve_str(":template", true)
            .unwrap()
            .data()
            .cloned()
            .unwrap_or_default()
    }

    #[rstest]
    // A lone splice preserves the resolved value's type
    #[case::type_preserving("$(:.n)", 5.into())]
    #[case::short_form("$:.n", 5.into())]
    #[case::argument("$(who)", "World".into())]
    #[case::short_form_argument("$who", "World".into())]
    // Plain strings pass through untouched
    #[case::no_splices("just text", "just text".into())]
    #[case::lone_dollar("cost: 5$", "cost: 5$".into())]
    // Multiple fragments compose into an expression
    #[case::composed("$(:.n) * 2", 10.into())]
    #[case::composed_short("$:.n + 1", 6.into())]
    #[case::comparison_template("$(:.n) < 3", false.into())]
    // Expression bodies inside a single splice
    #[case::expression_body("$(:.n * 10)", 50.into())]
    #[case::conditional_body("$(1 if :.n < 3 else 2)", 2.into())]
    // Bodies that aren't paths must fail over to expression evaluation:
    // spaced-out source is rejected by the path parser itself, and a
    // spaceless body whose segment compiles as a regex matching no key is a
    // resolution miss rather than a vacuous empty batch
    #[case::conditional_with_paths("$(1 if :.n <= 1 else :.n * 2)", 10.into())]
    #[case::star_in_pseudo_path("$(:.n * :.n)", 25.into())]
    #[case::regex_lookalike("$(:.n*2)", 10.into())]
    // Wrapped quotes force string-mode
    #[case::string_mode("'N is $(:.n)!'", "N is 5!".into())]
    #[case::string_mode_hello("\"Hello, $(who)!\"", "Hello, World!".into())]
    fn test_expand(#[case] template: &str, #[case] expected: Value) {
        assert_eq!(expand(template), expected, "template: {template}");
    }

    /// An all-whitespace bare string expands to null
    #[test]
    fn test_blank() {
        assert_eq!(expand("   "), Value::Null);
    }

    /// The quoted-scalar marker turns on string-mode without wrapper quotes
    #[test]
    fn test_quoted_marker() {
        let document: Value = vec![
            ("n", Value::from(5)),
            ("msg", Value::quoted("n = $(:.n)")),
        ]
        .into();
        let result = Resolution::new(document, "doc", Map::new())
            .resolve_str(":msg", true)
            .unwrap()
            .data()
            .cloned()
            .unwrap();
        assert_eq!(result, "n = 5".into());
    }

    /// `**` merge keys splice another mapping in, with explicit keys winning
    #[test]
    fn test_merge_key() {
        let document: Value = vec![
            ("base", Value::from(vec![("a", 1), ("b", 2)])),
            (
                "derived",
                vec![
                    ("**", Value::from("$(:.base)")),
                    ("b", 20.into()),
                    ("c", 30.into()),
                ]
                .into(),
            ),
        ]
        .into();
        let state = Resolution::new(document, "doc", Map::new());
        let b = state.resolve_str(":derived.b", true).unwrap();
        assert_eq!(b.data().cloned().unwrap(), 20.into());
        let a = state.resolve_str(":derived.a", true).unwrap();
        assert_eq!(a.data().cloned().unwrap(), 1.into());
    }
}
