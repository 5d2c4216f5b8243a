//! Cross-module tests driving the whole engine through the facade.

use crate::{
    Accessor, Check, Error, ErrorMode, Key, Map, Resolution, Value, access,
};
use pretty_assertions::assert_eq;
use quarry_util::{assert_err, assert_matches};
use rstest::rstest;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

#[rstest]
#[case::attribute(
    vec![("my_test", Value::from(42))].into(),
    "my_test",
    42.into(),
)]
#[case::nested(
    vec![(
        "my_dictionary",
        Value::from(vec![("my_key", Value::quoted("hi"))]),
    )]
    .into(),
    "my_dictionary.my_key",
    "hi".into(),
)]
#[case::sequence_index(
    vec![(
        "my_config",
        Value::from(vec![("my_paths", Value::from(vec!["a", "b", "c"]))]),
    )]
    .into(),
    "my_config.my_paths.0",
    "a".into(),
)]
#[case::variable_in_path(
    vec![
        ("my_variable_test", Value::from(vec![("x", 1), ("y", 2)])),
        ("pick", "x".into()),
    ]
    .into(),
    "my_variable_test.$(:.pick)",
    1.into(),
)]
#[case::recursive_function(
    vec![(
        "fac",
        Value::from(vec![(
            "$n",
            Value::from("$(1 if n<=1 else n * :.fac(n-1))"),
        )]),
    )]
    .into(),
    "fac.5",
    120.into(),
)]
fn test_scenarios(
    #[case] document: Value,
    #[case] path: &str,
    #[case] expected: Value,
) {
    assert_eq!(access(&document, path).unwrap(), expected);
}

/// Argument values splice into quoted strings
#[test]
fn test_message_with_argument() {
    let document: Value = vec![(
        "my_message",
        Value::quoted("Hello, $(name_to_print)!"),
    )]
    .into();
    let value = Accessor::new(&document)
        .argument("name_to_print", "World")
        .access("my_message")
        .unwrap();
    assert_eq!(value, "Hello, World!".into());
}

/// The `**` merge key splices another mapping in; explicit keys win
#[rstest]
#[case::explicit_wins("derived.b", 20.into())]
#[case::merged("derived.a", 1.into())]
fn test_mapping_merge(#[case] path: &str, #[case] expected: Value) {
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
    assert_eq!(access(&document, path).unwrap(), expected);
}

/// A key literally present always wins, even with a capture key around
#[test]
fn test_literal_wins_over_capture() {
    let document: Value = vec![(
        "m",
        Value::from(vec![
            ("$x", Value::from("captured")),
            ("k", "literal".into()),
        ]),
    )]
    .into();
    assert_eq!(access(&document, "m.k").unwrap(), "literal".into());
}

/// A capture key binds the requested key as an argument visible to its value
#[test]
fn test_capture_binding() {
    let document: Value = vec![("$x", Value::from("$(x)"))].into();
    assert_eq!(access(&document, "anything").unwrap(), "anything".into());
}

/// Going up one more level than the cursor's depth fails
#[test]
fn test_upward_bound() {
    let document: Value =
        vec![("a", Value::from(vec![("b", 42)]))].into();
    let cursor = Resolution::new(document, "doc", Map::new())
        .resolve_str(":a.b", false)
        .unwrap();
    assert!(cursor.resolve_str("..", false).is_ok());
    assert_matches!(
        cursor.resolve_str("...", false),
        Err(Error::UpwardFromRoot { .. })
    );
}

/// Wildcards fan out and subsequent steps follow every branch
#[test]
fn test_wildcard_then_step() {
    let document: Value = vec![(
        "servers",
        Value::from(vec![
            ("web", Value::from(vec![("port", 80)])),
            ("db", Value::from(vec![("port", 5432)])),
        ]),
    )]
    .into();
    assert_eq!(
        access(&document, "servers.*.port").unwrap(),
        vec![80, 5432].into()
    );
}

/// Full evaluation is idempotent: feeding an evaluated result back through
/// the engine changes nothing
#[test]
fn test_full_evaluation_idempotent() {
    let document: Value = vec![
        ("n", Value::from(5)),
        (
            "all",
            vec![
                ("x", Value::from("$(:.n)")),
                ("msg", Value::quoted("n=$(:.n)")),
            ]
            .into(),
        ),
    ]
    .into();
    let once = access(&document, "all").unwrap();
    let twice = access(&once, "").unwrap();
    assert_eq!(once, twice);
}

/// A bare splice keeps the resolved value's type
#[test]
fn test_type_preservation() {
    let document: Value =
        vec![("n", Value::from(5)), ("v", "$(:.n)".into())].into();
    assert_matches!(access(&document, "v").unwrap(), Value::Int(5));
}

/// Without full evaluation, templates come back untouched
#[test]
fn test_shallow_access() {
    let document: Value =
        vec![("n", Value::from(1)), ("t", "$(:.n)".into())].into();
    let value = Accessor::new(&document)
        .evaluate_fully(false)
        .access("t")
        .unwrap();
    assert_eq!(value, "$(:.n)".into());
}

/// Regex keys bind their named groups as arguments in each branch
#[test]
fn test_regex_key_groups() {
    let document: Value = vec![(
        "items",
        Value::from(vec![
            ("a1", Value::from("$(num)")),
            ("a2", "$(num)".into()),
            ("b9", "$(num)".into()),
        ]),
    )]
    .into();
    let value = access(&document, r"items.'a(?P<num>\d)'").unwrap();
    assert_eq!(value, vec!["1", "2"].into());
}

/// Trailing dots resolve to the label of the current entry
#[test]
fn test_name_of_self() {
    let document: Value = vec![(
        "a",
        Value::from(vec![("b", Value::from("$(.)"))]),
    )]
    .into();
    assert_eq!(access(&document, "a.b").unwrap(), "b".into());
    assert_eq!(access(&document, "a.").unwrap(), "a".into());
}

/// Positional maps merge first-wins, keyword arguments override
#[test]
fn test_argument_merging() {
    let document: Value = vec![("v", Value::from("$([x, y, z])"))].into();
    let first = Map::from_iter([
        (Key::from("x"), Value::from(1)),
        (Key::from("y"), Value::from(10)),
    ]);
    let second = Map::from_iter([
        (Key::from("x"), Value::from(2)),
        (Key::from("z"), Value::from(3)),
    ]);
    let value = Accessor::new(&document)
        .arguments(first)
        .arguments(second)
        .argument("y", 99)
        .access("v")
        .unwrap();
    assert_eq!(value, vec![1, 99, 3].into());
}

/// A fallback short-circuits every failure
#[test]
fn test_fallback() {
    let document: Value = vec![("a", Value::from(1))].into();
    let value = Accessor::new(&document)
        .fallback("default")
        .access("missing")
        .unwrap();
    assert_eq!(value, "default".into());
}

#[test]
fn test_error_modes() {
    let document: Value = vec![("a", Value::from(1))].into();
    assert_err!(access(&document, "missing"), "No key");

    let value = Accessor::new(&document)
        .on_error(ErrorMode::Ignore)
        .access("missing")
        .unwrap();
    assert_eq!(value, Value::Null);

    let reported = Arc::new(AtomicUsize::new(0));
    let accessor =
        Accessor::new(&document).on_error(ErrorMode::Report(Box::new({
            let reported = Arc::clone(&reported);
            move |_| {
                reported.fetch_add(1, Ordering::SeqCst);
            }
        })));
    assert_eq!(accessor.access("missing").unwrap(), Value::Null);
    assert_eq!(reported.load(Ordering::SeqCst), 1);
}

#[test]
fn test_checks() {
    let document: Value = vec![
        ("empty", Value::from(Vec::<Value>::new())),
        ("items", vec![1].into()),
        ("zero", 0.into()),
    ]
    .into();
    assert!(
        Accessor::new(&document)
            .check(Check::Sequence)
            .access("items")
            .is_ok()
    );
    assert_err!(
        Accessor::new(&document)
            .check(Check::Sequence)
            .access("empty"),
        "is not valid"
    );
    assert_err!(
        Accessor::new(&document).check(Check::Truthy).access("zero"),
        "is not valid"
    );
    let even = Accessor::new(&document).check(Check::Predicate(Box::new(
        |value| matches!(value, Value::Int(i) if i % 2 == 0),
    )));
    assert!(even.access("zero").is_ok());
}

/// Error messages carry the attempted key and the location trail
#[test]
fn test_error_location() {
    let document: Value = vec![(
        "outer",
        Value::from(vec![("inner", Value::from(vec![("x", 1)]))]),
    )]
    .into();
    let error = Accessor::new(&document)
        .name("config")
        .access("outer.inner.nope")
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("nope"), "missing key in: {message}");
    assert!(
        message.contains("config.outer.inner"),
        "missing location in: {message}"
    );
}
