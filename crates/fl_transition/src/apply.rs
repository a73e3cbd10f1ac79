//! Inputs accepted by `apply`
//!
//! An apply either writes a set of scope properties or runs a callback
//! against the scope. Property values may be computed: the closure runs at
//! apply time and its result is written, so a named state holding a
//! computed entry re-evaluates it on every trigger.

use fl_core::{ReactiveScope, Value, ValueMap};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// One entry of a [`Changes`] set
#[derive(Clone)]
pub enum PropertyValue {
    Value(Value),
    Computed(Rc<dyn Fn() -> Value>),
}

impl PropertyValue {
    pub fn resolve(&self) -> Value {
        match self {
            PropertyValue::Value(value) => value.clone(),
            PropertyValue::Computed(compute) => compute(),
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            PropertyValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Scope property writes, in insertion order
#[derive(Clone, Debug, Default)]
pub struct Changes {
    entries: IndexMap<String, PropertyValue>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .insert(name.into(), PropertyValue::Value(value.into()));
        self
    }

    /// Write the result of `compute`, evaluated when applied
    pub fn computed(
        mut self,
        name: impl Into<String>,
        compute: impl Fn() -> Value + 'static,
    ) -> Self {
        self.entries
            .insert(name.into(), PropertyValue::Computed(Rc::new(compute)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate every entry
    pub fn resolve(&self) -> ValueMap {
        self.entries
            .iter()
            .map(|(name, value)| (name.clone(), value.resolve()))
            .collect()
    }
}

impl From<ValueMap> for Changes {
    fn from(values: ValueMap) -> Self {
        Self {
            entries: values
                .into_iter()
                .map(|(name, value)| (name, PropertyValue::Value(value)))
                .collect(),
        }
    }
}

/// What `apply` does to the scope
pub enum Apply {
    /// Write properties
    Values(Changes),
    /// Run a callback for its side effect
    Call(Box<dyn FnOnce(&dyn ReactiveScope)>),
}

impl Apply {
    pub fn call(f: impl FnOnce(&dyn ReactiveScope) + 'static) -> Self {
        Apply::Call(Box::new(f))
    }

    /// Perform the writes; returns the names written
    pub(crate) fn run(self, scope: &dyn ReactiveScope) -> Vec<String> {
        match self {
            Apply::Values(changes) => changes
                .resolve()
                .into_iter()
                .map(|(name, value)| {
                    scope.set(&name, value);
                    name
                })
                .collect(),
            Apply::Call(f) => {
                f(scope);
                Vec::new()
            }
        }
    }
}

impl From<Changes> for Apply {
    fn from(changes: Changes) -> Self {
        Apply::Values(changes)
    }
}

impl From<ValueMap> for Apply {
    fn from(values: ValueMap) -> Self {
        Apply::Values(values.into())
    }
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Apply::Values(changes) => f.debug_tuple("Values").field(changes).finish(),
            Apply::Call(_) => f.write_str("Call(..)"),
        }
    }
}
