//! Fire parameters
//!
//! Every dispatched cycle carries the parameters supplied to the `apply`
//! (or named state) that produced it. Besides arbitrary data for the suite,
//! two callbacks are recognised:
//!
//! - `after_fire` runs right after the current suite's `fire` returns
//! - `on_complete` runs when the suite reports its effect has settled,
//!   through [`FireParams::complete`]

use fl_core::{Value, ValueMap};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Callback stored in fire parameters
pub type Callback = Rc<dyn Fn()>;

/// Parameters passed to a suite's `fire`
#[derive(Clone, Default)]
pub struct FireParams {
    values: ValueMap,
    after_fire: Option<Callback>,
    on_complete: Option<Callback>,
    /// Shared by the clones handed out within one cycle
    completed: Rc<Cell<bool>>,
}

impl FireParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters carrying only data
    pub fn from_values(values: ValueMap) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Add a data entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Run `f` after the cycle's fire
    pub fn after_fire(mut self, f: impl Fn() + 'static) -> Self {
        self.after_fire = Some(Rc::new(f));
        self
    }

    /// Run `f` once the firing suite's effect completes
    pub fn on_complete(mut self, f: impl Fn() + 'static) -> Self {
        self.on_complete = Some(Rc::new(f));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    pub fn has_after_fire(&self) -> bool {
        self.after_fire.is_some()
    }

    /// Report the effect as settled
    ///
    /// Runs `on_complete` the first time it is called in a cycle and
    /// returns whether this call did so.
    pub fn complete(&self) -> bool {
        if self.completed.replace(true) {
            return false;
        }
        if let Some(on_complete) = &self.on_complete {
            on_complete();
            true
        } else {
            false
        }
    }

    /// Copy for a new cycle with a fresh completion flag
    pub(crate) fn for_cycle(&self) -> Self {
        Self {
            values: self.values.clone(),
            after_fire: self.after_fire.clone(),
            on_complete: self.on_complete.clone(),
            completed: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn run_after_fire(&self) {
        if let Some(after_fire) = &self.after_fire {
            after_fire();
        }
    }
}

impl From<ValueMap> for FireParams {
    fn from(values: ValueMap) -> Self {
        Self::from_values(values)
    }
}

impl fmt::Debug for FireParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FireParams")
            .field("values", &self.values)
            .field("after_fire", &self.after_fire.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_runs_once_per_cycle() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let params = FireParams::new().on_complete(move || counter.set(counter.get() + 1));

        let cycle = params.for_cycle();
        let shared = cycle.clone();
        assert!(cycle.complete());
        assert!(!shared.complete());
        assert_eq!(calls.get(), 1);

        // A later cycle completes again
        assert!(params.for_cycle().complete());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_data_entries() {
        let params = FireParams::new().with("a", "value1").with("duration", 300);
        assert_eq!(params.get("a"), Some(&Value::from("value1")));
        assert_eq!(params.values().len(), 2);
        assert!(!params.has_after_fire());
    }
}
