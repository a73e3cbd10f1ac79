//! Per-cycle change detection
//!
//! The controller keeps two values per scope property: the latest one its
//! watch observed and the one last dispatched. At the end of every digest
//! it compares the two for each bound property; the differences (plus any
//! properties a state trigger forced) form the cycle's changes.
//!
//! Halting only stops the comparison. Nothing is queued: the dispatched
//! baseline stays where it was, so whatever changed while halted shows up
//! on the first cycle after `resume`.

use fl_core::Value;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

use crate::params::FireParams;

/// A bound property that changed this cycle
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub scope_property: String,
    pub transition_property: String,
    pub new: Value,
    pub old: Value,
}

/// Everything one dispatched cycle works on
#[derive(Debug, Default)]
pub struct Cycle {
    pub changes: Vec<PropertyChange>,
    pub params: Option<FireParams>,
}

#[derive(Debug, Default)]
pub struct DispatchController {
    /// Latest value reported by each watch
    latest: FxHashMap<String, Value>,
    /// Value handed to handlers on the last dispatched cycle
    dispatched: FxHashMap<String, Value>,
    /// Properties to dispatch next cycle regardless of their value
    forced: IndexSet<String>,
    /// Params for the next dispatched cycle
    params: Option<FireParams>,
    halted: bool,
    cycles: u64,
}

impl DispatchController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what a watch saw
    pub fn observe(&mut self, scope_property: &str, value: &Value) {
        self.latest
            .insert(scope_property.to_string(), value.clone());
    }

    /// Dispatch these properties next cycle even if unchanged
    pub fn force<'a>(&mut self, scope_properties: impl IntoIterator<Item = &'a str>) {
        self.forced
            .extend(scope_properties.into_iter().map(str::to_string));
    }

    /// Params for the next dispatched cycle; replaces any pending ones
    pub fn set_params(&mut self, params: Option<FireParams>) {
        self.params = params;
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn resume(&mut self) {
        self.halted = false;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of cycles collected so far (halted cycles excluded)
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Collect the changes for this cycle
    ///
    /// Returns `None` while halted. Otherwise the baseline advances, the
    /// forced set is cleared and pending params are consumed, whether or
    /// not anything changed.
    pub fn collect(&mut self, bindings: &IndexMap<String, String>) -> Option<Cycle> {
        if self.halted {
            return None;
        }
        self.cycles += 1;

        let mut changes = Vec::new();
        for (scope_property, transition_property) in bindings {
            let Some(latest) = self.latest.get(scope_property) else {
                continue;
            };
            let forced = self.forced.contains(scope_property);
            let old = match self.dispatched.get(scope_property) {
                // First observation: old mirrors new
                None => latest.clone(),
                Some(base) if forced || !base.same(latest) => base.clone(),
                Some(_) => continue,
            };
            changes.push(PropertyChange {
                scope_property: scope_property.clone(),
                transition_property: transition_property.clone(),
                new: latest.clone(),
                old,
            });
        }

        for change in &changes {
            self.dispatched
                .insert(change.scope_property.clone(), change.new.clone());
        }
        self.forced.clear();

        Some(Cycle {
            changes,
            params: self.params.take().map(|params| params.for_cycle()),
        })
    }
}
