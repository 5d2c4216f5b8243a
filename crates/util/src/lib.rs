//! Common utilities that aren't specific to one other subcrate and are
//! unlikely to change frequently. The main purpose of this is to pull shared
//! plumbing out of the engine crate so it can focus on navigation and
//! evaluation.
//!
//! **This crate is not semver compliant**. The version is locked to the root
//! `quarry` crate version. If you choose to depend directly on this crate,
//! you do so at your own risk of breakage.

pub mod scalar;
#[cfg(any(test, feature = "test"))]
mod test_util;

use std::fmt::Display;
use tracing::error;

/// Extension trait for [Result]
pub trait ResultTraced<T, E>: Sized {
    /// If this is an error, trace it. Return the same result.
    #[must_use]
    fn traced(self) -> Self;
}

impl<T, E: Display> ResultTraced<T, E> for Result<T, E> {
    fn traced(self) -> Self {
        self.inspect_err(|error| error!(%error))
    }
}
