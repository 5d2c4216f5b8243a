//! The navigation engine: one-step indirection over the cursor plus the
//! multi-step resolve loop.
//!
//! Failures on the main navigation line are errors; failures inside a
//! multiplexed step (accessing every element of a sequence, fanning a key
//! through a batch) just drop that branch, preserving the order of the
//! surviving ones.

use crate::{
    error::Error,
    evaluate::Evaluated,
    expression::Expr,
    parse::{self, Origin, Path, Step},
    resolution::Resolution,
    value::{Batch, Key, Map, Value},
};
use quarry_util::scalar;
use regex::Regex;
use std::sync::Arc;
use tracing::trace;

/// One access step's key, tracking whether deferred evaluation has happened.
/// Evaluation runs at most once, on demand, against the resolution that
/// initiated the resolve (the call site), not the position navigated to.
#[derive(Debug)]
pub(crate) enum StepKey {
    /// A literal key straight from the source text; nothing to evaluate
    Plain(Value),
    /// A coerced scalar whose text contains `$`; evaluating it expands the
    /// splices
    Deferred { value: Value, text: String },
    /// A parenthesised expression, evaluated on demand
    Expr { expr: Expr, text: String },
    /// The outcome of deferred evaluation
    Evaluated(Evaluated),
}

impl StepKey {
    pub(crate) fn from_part(text: &str) -> Self {
        let value = Value::from(scalar::parse_scalar(text));
        if text.contains('$') && matches!(value, Value::String(_)) {
            Self::Deferred {
                value,
                text: text.to_owned(),
            }
        } else {
            Self::Plain(value)
        }
    }

    fn from_step(step: &Step) -> Self {
        match step {
            Step::Part(text) => Self::from_part(text),
            Step::Key(value) => Self::Plain(value.clone()),
            Step::Expr(expr) => Self::Expr {
                expr: expr.clone(),
                text: String::new(),
            },
            // Handled by the resolve loop
            Step::Up => unreachable!("upward steps have no key"),
        }
    }

    /// Current best-known value of the key
    fn value(&self) -> Value {
        match self {
            Self::Plain(value) | Self::Deferred { value, .. } => value.clone(),
            Self::Expr { text, .. } => Value::from(text.as_str()),
            Self::Evaluated(Evaluated::Plain(value)) => value.clone(),
            Self::Evaluated(Evaluated::Resolved(resolution)) => {
                resolution.data().cloned().unwrap_or_default()
            }
        }
    }

    /// The key value usable for literal lookup. Unevaluated expression keys
    /// have no value yet; they only become lookupable after evaluation.
    fn lookup_value(&self) -> Option<Value> {
        match self {
            Self::Expr { .. } => None,
            _ => Some(self.value()),
        }
    }

    /// The key's display form, used for location labels and error messages
    fn label(&self) -> String {
        self.value().to_string()
    }

    /// Only a literal, source-level `*` is the wildcard. An expansion that
    /// merely evaluates to `"*"` is an ordinary key.
    fn is_literal_star(&self) -> bool {
        matches!(
            self,
            Self::Plain(Value::String(text)) if text.as_str() == "*"
        )
    }

    /// The key's text, if it's a string eligible for regex matching. Keys
    /// that resolved by reference are excluded: their value belongs to
    /// another navigation context.
    fn regex_text(&self) -> Option<String> {
        match self {
            Self::Plain(Value::String(text))
            | Self::Deferred {
                value: Value::String(text),
                ..
            }
            | Self::Evaluated(Evaluated::Plain(Value::String(text))) => {
                Some(text.as_str().to_owned())
            }
            _ => None,
        }
    }

    /// The value a capture key binds: by value for plain keys, by reference
    /// for keys that were evaluated through the engine
    fn binding(&self) -> Value {
        match self {
            Self::Evaluated(Evaluated::Resolved(resolution)) => {
                Value::Handle(Arc::new(resolution.clone()))
            }
            other => other.value(),
        }
    }

    /// Evaluate the key if it hasn't been already. Returns true if
    /// evaluation ran just now.
    fn ensure_evaluated(&mut self, site: &Resolution) -> Result<bool, Error> {
        let evaluated = match self {
            Self::Deferred { text, .. } => site.evaluate_text(text)?,
            Self::Expr { expr, .. } => {
                Evaluated::Resolved(site.set(expr.eval(site)?))
            }
            _ => return Ok(false),
        };
        *self = Self::Evaluated(evaluated);
        Ok(true)
    }
}

/// A mapping key of shape `$` or `$name`, matching any requested key
pub(crate) fn is_capture_key(text: &str) -> bool {
    text.strip_prefix('$').is_some_and(|rest| {
        rest.chars().all(|c| c.is_alphanumeric() || c == '_')
    })
}

/// The regex-detection heuristic: any of `\ + * . ( ) [ ] { }`, excluding
/// the bare wildcard. Changing this set is a compatibility break.
fn is_regex(text: &str) -> bool {
    text != "*"
        && text.chars().any(|c| {
            matches!(
                c,
                '\\' | '+' | '*' | '.' | '(' | ')' | '[' | ']' | '{' | '}'
            )
        })
}

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|source| Error::BadRegex {
        pattern: pattern.to_owned(),
        source: Box::new(source),
    })
}

/// The argument scope contributed by a regex key match: named groups when
/// the pattern has any, otherwise positional groups keyed by index
fn group_scope(regex: &Regex, captures: &regex::Captures) -> Map {
    let mut scope = Map::new();
    let named: Vec<&str> = regex.capture_names().flatten().collect();
    if named.is_empty() {
        for (i, group) in captures.iter().enumerate().skip(1) {
            scope.insert(
                Key::Int(i as i64 - 1),
                group.map(|m| Value::from(m.as_str())).unwrap_or_default(),
            );
        }
    } else {
        for name in named {
            scope.insert(
                Key::from(name),
                captures
                    .name(name)
                    .map(|m| Value::from(m.as_str()))
                    .unwrap_or_default(),
            );
        }
    }
    scope
}

/// The value a regex match over a string cursor produces: the named-group
/// mapping if the pattern has named groups, else the positional groups, else
/// the whole match text
fn match_value(regex: &Regex, captures: &regex::Captures) -> Value {
    let named: Vec<&str> = regex.capture_names().flatten().collect();
    if !named.is_empty() {
        named
            .into_iter()
            .map(|name| {
                (
                    Key::from(name),
                    captures
                        .name(name)
                        .map(|m| Value::from(m.as_str()))
                        .unwrap_or_default(),
                )
            })
            .collect::<Map>()
            .into()
    } else if captures.len() > 1 {
        captures
            .iter()
            .skip(1)
            .map(|group| {
                group.map(|m| Value::from(m.as_str())).unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .into()
    } else {
        Value::from(&captures[0])
    }
}

impl Resolution {
    /// Resolve a path string against this state. With `evaluate_fully`, the
    /// result is recursively expanded and any surviving batches collapse to
    /// ordered sequences.
    pub fn resolve_str(
        &self,
        path: &str,
        evaluate_fully: bool,
    ) -> Result<Resolution, Error> {
        let path = parse::parse_path(path)?;
        self.resolve_path(&path, evaluate_fully)
    }

    pub(crate) fn resolve_path(
        &self,
        path: &Path,
        evaluate_fully: bool,
    ) -> Result<Resolution, Error> {
        // Select the origin
        let mut result = match path.origin {
            Origin::Root => self.enter_root(),
            Origin::Arguments => self.enter_arguments(),
            Origin::Current => self.clone(),
            Origin::Up(levels) => {
                let mut result = self.clone();
                for _ in 0..levels {
                    result = result.pop()?;
                }
                result
            }
        };

        // The step loop
        for step in &path.steps {
            if let Step::Up = step {
                result = result.pop()?;
                continue;
            }
            // A step's value may itself be a template whose expansion
            // determines the next navigable structure
            result = result.evaluate(false)?;
            let mut key = StepKey::from_step(step);
            trace!(
                key = %key.label(),
                location = %result.location(),
                "step"
            );
            result = result.indirect(&mut key, self)?;
        }

        // A trailing standalone dot resolves to the label of the entry the
        // cursor sits under
        if path.trailing_label {
            result = result.name_of_self();
        }

        // Make sure we get the actual definition of the value
        let result = result.finalize(false);
        if evaluate_fully {
            Ok(result.evaluate(true)?.finalize(true))
        } else {
            Ok(result)
        }
    }

    /// Replace the cursor with the label it currently sits under, fanning
    /// out through batches
    fn name_of_self(&self) -> Resolution {
        match self.data() {
            Some(Value::Batch(batch)) => {
                let branches = batch
                    .branches()
                    .iter()
                    .map(Resolution::name_of_self)
                    .collect();
                self.set(Value::Batch(Batch::new(branches)))
            }
            _ => {
                let label = self
                    .self_label()
                    .unwrap_or_else(|| self.name())
                    .to_owned();
                self.set(Value::from(label))
            }
        }
    }

    /// One step of indirection: interpret `key` against the current cursor,
    /// dispatching on its runtime shape. `site` is the resolution that
    /// initiated the resolve; deferred keys evaluate against it.
    pub(crate) fn indirect(
        &self,
        key: &mut StepKey,
        site: &Resolution,
    ) -> Result<Resolution, Error> {
        let cursor = self.data().cloned().unwrap_or_default();
        if let Value::Null = cursor {
            return Err(Error::NoSuchKey {
                key: key.label(),
                location: format!("{} = null", self.location()),
            });
        }

        match cursor {
            // A handle cursor means we continue inside the referenced
            // context and retry there
            Value::Handle(inner) => self.call(&inner).indirect(key, site),
            Value::Map(map) => self.indirect_map(&map, key, site),
            cursor => {
                // Everything below needs the key fully evaluated
                key.ensure_evaluated(site)?;
                if let Value::Batch(key_batch) = key.value() {
                    return Ok(self.indirect_each(&key_batch, site));
                }
                match cursor {
                    Value::Seq(seq) => self.indirect_seq(&seq, key, site),
                    Value::Batch(batch) => {
                        let branches = batch
                            .branches()
                            .iter()
                            .filter_map(|branch| {
                                branch.indirect(key, site).ok()
                            })
                            .collect();
                        Ok(self.push(
                            Value::Batch(Batch::new(branches)),
                            key.label(),
                            Map::new(),
                        ))
                    }
                    Value::String(text) => {
                        self.indirect_string(text.as_str(), key)
                    }
                    other => Err(Error::CannotAccess {
                        key: key.label(),
                        location: self.location(),
                        actual: other.type_name(),
                    }),
                }
            }
        }
    }

    /// Mapping indirection: wildcard, literal lookup, deferred-key
    /// evaluation, regex keys, and the capture-key fallback, in that order
    fn indirect_map(
        &self,
        map: &Map,
        key: &mut StepKey,
        site: &Resolution,
    ) -> Result<Resolution, Error> {
        // A literal asterisk gives every value regardless of key
        if key.is_literal_star() {
            let branches = map
                .iter()
                .map(|(k, v)| self.push(v.clone(), k.to_string(), Map::new()))
                .collect();
            return Ok(self.push(
                Value::Batch(Batch::new(branches)),
                "*",
                Map::new(),
            ));
        }

        // Literal lookup
        if let Some(k) = key.lookup_value().as_ref().and_then(Key::for_value)
            && let Some(value) = map.get(&k)
        {
            return Ok(self.push(value.clone(), k.to_string(), Map::new()));
        }

        // Scan for capture keys. A single unnamed `$` short-circuits: the
        // requested key is discarded without ever being evaluated.
        let captures: Vec<&str> = map
            .keys()
            .filter_map(Key::as_str)
            .filter(|k| is_capture_key(k))
            .collect();
        if captures == ["$"] {
            let value = map[&Key::from("$")].clone();
            return Ok(self.push(value, "$", Map::new()));
        }

        // Evaluate the key now, then retry the literal lookup
        if key.ensure_evaluated(site)? {
            let value = key.value();
            if let Value::Batch(key_batch) = &value {
                return Ok(self.indirect_each(key_batch, site));
            }
            if let Some(k) = Key::for_value(&value)
                && let Some(value) = map.get(&k)
            {
                return Ok(self.push(
                    value.clone(),
                    k.to_string(),
                    Map::new(),
                ));
            }
        }

        // A key that looks like a regular expression matches against every
        // key, pushing the match groups as an argument scope per branch. A
        // pattern that matches no key at all is a miss, not an empty
        // fan-out: it falls through to the capture fallback below, so text
        // that merely contains regex metacharacters never turns a failed
        // lookup into a vacuous success.
        if let Some(pattern) = key.regex_text()
            && is_regex(&pattern)
        {
            let regex = compile(&pattern)?;
            let branches: Vec<Resolution> = map
                .iter()
                .filter_map(|(k, v)| {
                    let text = k.as_str()?;
                    let captures = regex.captures(text)?;
                    // Anchored at the start of the key: a match, not a search
                    if captures.get(0)?.start() != 0 {
                        return None;
                    }
                    let scope = group_scope(&regex, &captures);
                    Some(self.push(v.clone(), text, scope))
                })
                .collect();
            if !branches.is_empty() {
                return Ok(self.push(
                    Value::Batch(Batch::new(branches)),
                    pattern,
                    Map::new(),
                ));
            }
        }

        // Capture-key fallback
        match captures.as_slice() {
            [] => Err(Error::NoSuchKey {
                key: key.label(),
                location: self.location(),
            }),
            [capture] => {
                let value = map[&Key::from(*capture)].clone();
                let name = &capture[1..];
                let scope = Map::from_iter([(
                    Key::from(name),
                    key.binding(),
                )]);
                Ok(self.push(value, *capture, scope))
            }
            _ => Err(Error::AmbiguousCapture {
                keys: captures.join(", "),
                location: self.location(),
            }),
        }
    }

    /// Sequence indirection: integer indexing (negative indices count from
    /// the end), wildcard batching, or multiplexing any other key over every
    /// element
    fn indirect_seq(
        &self,
        seq: &[Value],
        key: &mut StepKey,
        site: &Resolution,
    ) -> Result<Resolution, Error> {
        if let Value::Int(index) = key.value() {
            let len = seq.len() as i64;
            if -len <= index && index < len {
                let i = if index < 0 { index + len } else { index } as usize;
                // A reference stored in a sequence resolves in place
                if let Value::Handle(inner) = &seq[i] {
                    return Ok(inner.as_ref().clone());
                }
                return Ok(self.push(
                    seq[i].clone(),
                    i.to_string(),
                    Map::new(),
                ));
            }
            return Err(Error::IndexOutOfRange {
                index,
                len: seq.len(),
                location: self.location(),
            });
        }

        if key.is_literal_star() {
            let branches = seq
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    self.push(v.clone(), i.to_string(), index_scope(i))
                })
                .collect();
            return Ok(self.push(
                Value::Batch(Batch::new(branches)),
                "*",
                Map::new(),
            ));
        }

        // Multiplex: apply the key to every element, dropping the branches
        // where it doesn't resolve
        let branches = seq
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                self.push(v.clone(), i.to_string(), index_scope(i))
                    .indirect(key, site)
                    .ok()
            })
            .collect();
        Ok(self.push(
            Value::Batch(Batch::new(branches)),
            key.label(),
            Map::new(),
        ))
    }

    /// String indirection: the key is a regex matched over the cursor text;
    /// each match becomes a branch
    fn indirect_string(
        &self,
        text: &str,
        key: &mut StepKey,
    ) -> Result<Resolution, Error> {
        let key_value = key.value();
        let Some(pattern) = key_value.as_str() else {
            return Err(Error::CannotAccess {
                key: key.label(),
                location: self.location(),
                actual: "string",
            });
        };
        let regex = compile(pattern)?;
        let branches = regex
            .captures_iter(text)
            .enumerate()
            .map(|(i, captures)| {
                self.push(
                    match_value(&regex, &captures),
                    i.to_string(),
                    Map::new(),
                )
            })
            .collect();
        Ok(self.push(Value::Batch(Batch::new(branches)), pattern, Map::new()))
    }

    /// Fan a batch-valued key out: one branch per key, failures dropped
    fn indirect_each(&self, keys: &Batch, site: &Resolution) -> Resolution {
        let branches = keys
            .branches()
            .iter()
            .filter_map(|branch| {
                let mut key =
                    StepKey::Plain(branch.data().cloned().unwrap_or_default());
                self.indirect(&mut key, site).ok()
            })
            .collect();
        self.push(Value::Batch(Batch::new(branches)), "<batch>", Map::new())
    }
}

fn index_scope(index: usize) -> Map {
    Map::from_iter([(Key::from("__index"), Value::Int(index as i64))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quarry_util::{assert_err, assert_matches};
    use rstest::rstest;

    fn resolve(document: Value, path: &str) -> Result<Value, Error> {
        let state = Resolution::new(document, "doc", Map::new());
        let resolution = state.resolve_str(&format!(":{path}"), true)?;
        Ok(resolution.data().cloned().unwrap_or_default())
    }

    fn hosts() -> Value {
        vec![(
            "hosts",
            Value::from(vec![
                ("alpha", Value::from(1)),
                ("beta", 2.into()),
                ("alphonse", 3.into()),
            ]),
        )]
        .into()
    }

    #[rstest]
    #[case::literal("hosts.alpha", 1.into())]
    #[case::wildcard("hosts.*", vec![1, 2, 3].into())]
    #[case::regex("hosts.\"al.*\"", vec![1, 3].into())]
    fn test_mapping_keys(#[case] path: &str, #[case] expected: Value) {
        assert_eq!(resolve(hosts(), path).unwrap(), expected);
    }

    #[rstest]
    #[case::index("items.1", "b".into())]
    #[case::negative_index("items.-1", "c".into())]
    #[case::wildcard("items.*", vec!["a", "b", "c"].into())]
    fn test_sequence_keys(#[case] path: &str, #[case] expected: Value) {
        let document: Value =
            vec![("items", Value::from(vec!["a", "b", "c"]))].into();
        assert_eq!(resolve(document, path).unwrap(), expected);
    }

    /// Accessing a sequence with a mapping key multiplexes over the
    /// elements, dropping the ones where the key doesn't resolve
    #[test]
    fn test_multiplex() {
        let document: Value = vec![(
            "servers",
            Value::from(vec![
                Value::from(vec![("host", "a"), ("port", "1")]),
                vec![("host", "b")].into(),
                vec![("port", "2")].into(),
            ]),
        )]
        .into();
        assert_eq!(
            resolve(document, "servers.host").unwrap(),
            vec!["a", "b"].into()
        );
    }

    /// A string cursor is searched with the key as a regex. Single quotes
    /// keep the backslashes out of the path syntax.
    #[test]
    fn test_string_matching() {
        let document: Value =
            vec![("csv", Value::from("a=1, b=2"))].into();
        assert_eq!(
            resolve(document, r"csv.'(\w)=(\d)'").unwrap(),
            vec![
                Value::from(vec!["a", "1"]),
                Value::from(vec!["b", "2"]),
            ]
            .into()
        );
    }

    #[rstest]
    #[case::missing_key("hosts.gamma", "No key")]
    #[case::out_of_range("hosts.alpha.0", "Cannot access")]
    // The regex is anchored at the start of the key, like a match (not a
    // search): `pha` occurs inside keys but matches none of them
    #[case::regex_anchored("hosts.\"pha.*\"", "No key")]
    // A pattern matching zero keys is a miss, not an empty batch
    #[case::regex_no_match("hosts.\"zz.*\"", "No key")]
    fn test_errors(#[case] path: &str, #[case] message: &str) {
        assert_err!(resolve(hosts(), path), message);
    }

    #[test]
    fn test_index_out_of_range() {
        let document: Value = vec![("items", Value::from(vec![1, 2]))].into();
        assert_matches!(
            resolve(document, "items.5"),
            Err(Error::IndexOutOfRange { index: 5, len: 2, .. })
        );
    }

    #[test]
    fn test_capture_keys() {
        // The bare capture discards the requested key
        let discard: Value = vec![("$", Value::from("anything"))].into();
        let state = Resolution::new(discard, "doc", Map::new());
        assert_eq!(
            state
                .resolve_str(":whatever", true)
                .unwrap()
                .data()
                .cloned()
                .unwrap(),
            "anything".into()
        );

        // Two capture keys are ambiguous
        let ambiguous: Value =
            vec![("$a", Value::from(1)), ("$b", 2.into())].into();
        let state = Resolution::new(ambiguous, "doc", Map::new());
        assert_matches!(
            state.resolve_str(":whatever", true),
            Err(Error::AmbiguousCapture { .. })
        );
    }

    /// A regex-looking key that matches no literal key falls through to the
    /// capture fallback instead of producing an empty fan-out
    #[test]
    fn test_regex_miss_falls_through_to_capture() {
        let document: Value = vec![(
            "m",
            Value::from(vec![
                ("alpha", Value::from(1)),
                ("$k", "$(k)".into()),
            ]),
        )]
        .into();
        assert_eq!(
            resolve(document, "m.\"zz.*\"").unwrap(),
            "zz.*".into()
        );
    }

    #[rstest]
    #[case::star_is_not_a_regex("*", false)]
    #[case::plain("alpha", false)]
    #[case::dotted("al.*", true)]
    #[case::classes("[a-z]+", true)]
    #[case::braces("a{2}", true)]
    fn test_is_regex(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_regex(text), expected);
    }

    #[rstest]
    #[case::bare("$", true)]
    #[case::named("$name", true)]
    #[case::underscored("$my_arg", true)]
    #[case::not_a_capture("name", false)]
    #[case::punctuated("$a-b", false)]
    fn test_is_capture_key(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_capture_key(text), expected);
    }
}
