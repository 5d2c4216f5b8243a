//! The immutable navigation state threaded through a query.

use crate::{
    error::Error,
    value::{Map, Value},
};
use std::sync::Arc;

/// Label of the synthetic mapping frame that presents the argument-scope
/// union as a navigable cursor
pub(crate) const ARGUMENTS_LABEL: &str = "<arguments>";

/// Query-wide immutable context: the document being queried and its display
/// name for diagnostics
#[derive(Debug)]
struct Document {
    root: Value,
    name: String,
}

/// An immutable navigation state: the value under the cursor, how it was
/// reached, and which argument bindings are in scope.
///
/// Every transition returns a new `Resolution`; prior states remain valid, so
/// a state can be kept (e.g. inside a [Batch](crate::Batch) branch or a
/// capture-key reference) and continued from later. Cloning is cheap: the
/// document is shared through an `Arc` and values are `Arc`-backed.
///
/// Three parallel stacks:
/// - `values`: every value seen along the path; the last entry is the cursor
/// - `frames`: label trails describing how each navigation anchor was
///   entered; used only for diagnostics
/// - `scopes`: argument scopes; the active environment is the union with
///   later scopes winning. Scopes are append-only along a navigation line:
///   going upward does not unbind arguments
#[derive(Clone, Debug)]
pub struct Resolution {
    document: Arc<Document>,
    values: Vec<Value>,
    frames: Vec<Vec<String>>,
    scopes: Vec<Map>,
}

impl Resolution {
    /// Start a query against a document. `name` shows up as the first label
    /// in error locations. `arguments` seeds the argument-scope stack.
    pub fn new(
        document: Value,
        name: impl Into<String>,
        arguments: Map,
    ) -> Self {
        Self {
            document: Arc::new(Document {
                root: document,
                name: name.into(),
            }),
            values: Vec::new(),
            frames: Vec::new(),
            scopes: if arguments.is_empty() {
                Vec::new()
            } else {
                vec![arguments]
            },
        }
    }

    /// The current cursor value. `None` means navigation went past any value
    /// (e.g. upward from a fresh state)
    pub fn data(&self) -> Option<&Value> {
        self.values.last()
    }

    /// Dotted label trail describing where the cursor sits, for diagnostics
    pub fn location(&self) -> String {
        match self.frames.last() {
            Some(frame) if !frame.is_empty() => frame.join("."),
            _ => self.document.name.clone(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.document.name
    }

    /// The label under which the cursor currently sits
    pub(crate) fn self_label(&self) -> Option<&str> {
        self.frames
            .last()
            .and_then(|frame| frame.last())
            .map(String::as_str)
    }

    /// Union of the argument scopes, later scopes winning
    pub(crate) fn arguments(&self) -> Map {
        let mut union = Map::new();
        for scope in &self.scopes {
            for (key, value) in scope {
                union.insert(key.clone(), value.clone());
            }
        }
        union
    }

    /// Descend into a value: push it onto the accumulator, labelled with the
    /// step that produced it, optionally bringing a new argument scope
    pub(crate) fn push(
        &self,
        value: Value,
        label: impl Into<String>,
        scope: Map,
    ) -> Self {
        let mut result = self.clone();
        result.values.push(value);
        match result.frames.last_mut() {
            Some(frame) => frame.push(label.into()),
            None => result.frames.push(vec![label.into()]),
        }
        if !scope.is_empty() {
            result.scopes.push(scope);
        }
        result
    }

    /// Replace the cursor value in place
    pub(crate) fn set(&self, value: Value) -> Self {
        let mut result = self.clone();
        match result.values.last_mut() {
            Some(slot) => *slot = value,
            None => result.values.push(value),
        }
        result
    }

    /// Go up one level. Fails once the cursor is the anchor of the current
    /// navigation. Argument scopes are not popped: a binding made by a step
    /// stays visible to everything navigated afterwards.
    pub(crate) fn pop(&self) -> Result<Self, Error> {
        if self.values.len() <= 1 {
            return Err(Error::UpwardFromRoot {
                location: self.location(),
            });
        }
        let mut result = self.clone();
        result.values.pop();
        if let Some(frame) = result.frames.last_mut() {
            frame.pop();
        }
        Ok(result)
    }

    /// Continue inside another resolution's context, layering its cursor,
    /// location frame, and argument view on top of this one. This is how
    /// handle values are unwrapped without losing their origin.
    pub(crate) fn call(&self, other: &Resolution) -> Self {
        let mut result = self.clone();
        result
            .values
            .push(other.data().cloned().unwrap_or_default());
        result
            .frames
            .push(other.frames.last().cloned().unwrap_or_default());
        let arguments = other.arguments();
        if !arguments.is_empty() {
            result.scopes.push(arguments);
        }
        result
    }

    /// Start a new navigation anchored at the document root
    pub(crate) fn enter_root(&self) -> Self {
        let mut result = self.clone();
        result.values = vec![self.document.root.clone()];
        result.frames.push(vec![self.document.name.clone()]);
        result
    }

    /// Start a new navigation anchored at the argument-scope union, presented
    /// as a synthetic mapping cursor
    pub(crate) fn enter_arguments(&self) -> Self {
        let mut result = self.clone();
        result.values = vec![Value::from(self.arguments())];
        result.frames.push(vec![ARGUMENTS_LABEL.to_owned()]);
        result
    }

    /// Make sure the cursor is an actual definition: a handle cursor is
    /// replaced by the state it references. With `batches_to_seq`, a batch
    /// cursor collapses into an ordered sequence of its branch results.
    pub(crate) fn finalize(&self, batches_to_seq: bool) -> Self {
        match self.data() {
            Some(Value::Handle(inner)) => inner.finalize(batches_to_seq),
            Some(Value::Batch(batch)) if batches_to_seq => {
                let results = batch
                    .branches()
                    .iter()
                    .map(|branch| {
                        branch
                            .finalize(true)
                            .data()
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>();
                self.set(results.into())
            }
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Key;
    use pretty_assertions::assert_eq;
    use quarry_util::assert_matches;

    fn state() -> Resolution {
        let document: Value = vec![("a", Value::from(vec![("b", 42)]))].into();
        Resolution::new(document, "doc", Map::new())
    }

    #[test]
    fn test_push_pop() {
        let root = state().enter_root();
        let a = root.push(vec![("b", 42)].into(), "a", Map::new());
        let b = a.push(42.into(), "b", Map::new());
        assert_eq!(b.data(), Some(&Value::Int(42)));
        assert_eq!(b.location(), "doc.a.b");

        let back = b.pop().unwrap().pop().unwrap();
        assert_eq!(back.location(), "doc");
        // One more than the depth fails
        assert_matches!(back.pop(), Err(Error::UpwardFromRoot { .. }));
        // The original state is untouched
        assert_eq!(b.location(), "doc.a.b");
    }

    /// Scopes accumulate and later bindings win in the union view
    #[test]
    fn test_scope_union() {
        let scope1 = Map::from_iter([
            (Key::from("x"), Value::from(1)),
            (Key::from("y"), Value::from(2)),
        ]);
        let scope2 = Map::from_iter([(Key::from("x"), Value::from(10))]);
        let state = state()
            .enter_root()
            .push(Value::Null, "s1", scope1)
            .push(Value::Null, "s2", scope2);
        let union = state.arguments();
        assert_eq!(union.get(&Key::from("x")), Some(&Value::Int(10)));
        assert_eq!(union.get(&Key::from("y")), Some(&Value::Int(2)));
        // Bindings survive upward navigation
        assert_eq!(
            state.pop().unwrap().arguments().get(&Key::from("x")),
            Some(&Value::Int(10))
        );
    }
}
