//! End-to-end scenarios: YAML text in, final values out.

use pretty_assertions::assert_eq;
use quarry::{Accessor, Value, access, load_str};
use rstest::rstest;

const CONFIG: &str = r#"
my_test: 42
my_dictionary:
  my_key: hi
my_message: '"Hello, $(name_to_print)!"'
my_variable_test:
  x: 1
  y: 2
pick: x
my_config:
  my_paths:
    - a
    - b
    - c
fac:
  $n: $(1 if n<=1 else n * :.fac(n-1))
base:
  a: 1
  b: 2
derived:
  "**": $(:.base)
  b: 20
  c: 30
"#;

#[rstest]
#[case::attribute("my_test", 42.into())]
#[case::nested("my_dictionary.my_key", "hi".into())]
#[case::variable_in_path("my_variable_test.$(:.pick)", 1.into())]
#[case::sequence_index("my_config.my_paths.0", "a".into())]
#[case::recursive_function("fac.5", 120.into())]
#[case::merge_explicit_wins("derived.b", 20.into())]
#[case::merge_inherited("derived.a", 1.into())]
fn test_scenarios(#[case] path: &str, #[case] expected: Value) {
    let document = load_str(CONFIG).unwrap();
    assert_eq!(access(&document, path).unwrap(), expected, "path: {path}");
}

/// Arguments supplied by the caller are visible to splices
#[test]
fn test_message_with_argument() {
    let document = load_str(CONFIG).unwrap();
    let value = Accessor::new(&document)
        .argument("name_to_print", "World")
        .access("my_message")
        .unwrap();
    assert_eq!(value, "Hello, World!".into());
}

/// Templates referencing other parts of the document resolve on access
#[test]
fn test_cross_references() {
    let document = load_str("n: 2\nsquare: $(:.n * :.n)").unwrap();
    assert_eq!(access(&document, "square").unwrap(), 4.into());
}

/// Wildcards fan out over mappings, in document order
#[test]
fn test_wildcard() {
    let document = load_str(
        "servers:\n  web:\n    port: 80\n  db:\n    port: 5432",
    )
    .unwrap();
    assert_eq!(
        access(&document, "servers.*.port").unwrap(),
        vec![80, 5432].into()
    );
}
