//! Named transition states
//!
//! A state is a reusable preset: property values plus the fire parameters
//! to apply them with. Triggering a state always dispatches, even when the
//! stored values already match the scope.

use indexmap::IndexMap;

use crate::apply::Changes;
use crate::params::FireParams;

/// A configured preset
#[derive(Clone, Debug, Default)]
pub struct NamedState {
    pub values: Changes,
    pub params: Option<FireParams>,
}

/// Table of named states
#[derive(Debug, Default)]
pub struct StateMachine {
    states: IndexMap<String, NamedState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or overwrite a state
    pub fn config(&mut self, name: &str, values: Changes, params: Option<FireParams>) {
        let replaced = self
            .states
            .insert(name.to_string(), NamedState { values, params })
            .is_some();
        tracing::debug!(state = name, replaced, "state configured");
    }

    pub fn get(&self, name: &str) -> Option<&NamedState> {
        self.states.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
