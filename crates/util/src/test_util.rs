/// Assert a result is the `Err` variant whose message — including the
/// messages of its source chain, so wrappers don't hide the important part —
/// contains the given fragment. The chain is walked through
/// [std::error::Error::source], which every error in this workspace
/// implements via thiserror.
#[macro_export]
macro_rules! assert_err {
    ($e:expr, $msg:expr) => {{
        let msg = $msg;
        let error = $e.unwrap_err();
        let mut actual = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            actual.push_str(": ");
            actual.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        assert!(
            actual.contains(msg),
            "Expected error message to contain {msg:?}, but was: {actual:?}"
        );
    }};
}

/// Assert the given expression matches a pattern, with an optional guard.
/// The panic message shows the offending value next to the expected pattern.
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $pattern:pat $(if $guard:expr)? $(,)?) => {
        match $expr {
            $pattern $(if $guard)? => {}
            value => panic!(
                "Unexpected value {value:?} does not match pattern {expected}",
                expected = stringify!($pattern $(if $guard)?),
            ),
        }
    };
}

#[cfg(test)]
mod tests {
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer failure")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "inner cause")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    impl std::error::Error for Inner {}

    /// The source chain is included in the matched text
    #[test]
    fn test_assert_err_includes_sources() {
        let result: Result<(), Outer> = Err(Outer(Inner));
        assert_err!(result, "inner cause");
    }

    #[test]
    fn test_assert_matches_guard() {
        assert_matches!(Some(4), Some(n) if n % 2 == 0);
    }

    #[test]
    #[should_panic(expected = "does not match pattern")]
    fn test_assert_matches_mismatch() {
        assert_matches!(Some(3), Some(n) if n % 2 == 0);
    }
}
