//! Scope property bindings
//!
//! A binding maps a scope property (what the layout writes) to a logical
//! transition property (what a suite handles). The binder owns one watch
//! per distinct scope property: binding the same property again only
//! retargets it, and unbinding leaves the watch in place so a later
//! re-bind costs nothing.

use fl_core::{Subscription, Value, ValueMap};
use indexmap::IndexMap;

use crate::error::{Result, TransitionError};

/// Check and normalise a binding's names
///
/// Both names are trimmed and must be non-empty. The scope side is checked
/// first.
pub fn validate_binding(
    scope_property: &str,
    transition_property: &str,
) -> Result<(String, String)> {
    let scope_name = scope_property.trim();
    if scope_name.is_empty() {
        return Err(TransitionError::InvalidScopeProperty {
            value: scope_property.to_string(),
        });
    }
    let transition_name = transition_property.trim();
    if transition_name.is_empty() {
        return Err(TransitionError::InvalidTransitionProperty {
            value: transition_property.to_string(),
        });
    }
    Ok((scope_name.to_string(), transition_name.to_string()))
}

/// Check a binding given as dynamic values, e.g. read from configuration
///
/// Anything other than a non-empty string is rejected on the side it
/// appears, quoting the value.
pub fn validate_binding_value(
    scope_property: &Value,
    transition_property: &Value,
) -> Result<(String, String)> {
    let Some(scope_name) = scope_property.as_str() else {
        return Err(TransitionError::InvalidScopeProperty {
            value: scope_property.to_string(),
        });
    };
    let Some(transition_name) = transition_property.as_str() else {
        if scope_name.trim().is_empty() {
            return Err(TransitionError::InvalidScopeProperty {
                value: scope_name.to_string(),
            });
        }
        return Err(TransitionError::InvalidTransitionProperty {
            value: transition_property.to_string(),
        });
    };
    validate_binding(scope_name, transition_name)
}

/// Validate every entry of a binding hash
pub fn validate_binding_map(bindings: &ValueMap) -> Result<Vec<(String, String)>> {
    bindings
        .iter()
        .map(|(scope, transition)| validate_binding_value(&Value::from(scope.as_str()), transition))
        .collect()
}

/// Bindings plus the watches backing them
#[derive(Debug, Default)]
pub struct PropertyBinder {
    /// scope property -> transition property
    bindings: IndexMap<String, String>,
    /// One watch per scope property ever bound
    watches: IndexMap<String, Subscription>,
}

impl PropertyBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or retarget) a scope property
    ///
    /// `install` is only called when the scope property has no watch yet.
    /// Returns whether a watch was installed.
    pub fn bind(
        &mut self,
        scope_property: &str,
        transition_property: &str,
        install: impl FnOnce(&str) -> Subscription,
    ) -> Result<bool> {
        let (scope_name, transition_name) = validate_binding(scope_property, transition_property)?;

        let installed = if self.watches.contains_key(&scope_name) {
            false
        } else {
            let watch = install(&scope_name);
            self.watches.insert(scope_name.clone(), watch);
            true
        };

        tracing::debug!(
            scope_property = %scope_name,
            transition_property = %transition_name,
            installed,
            "bind"
        );
        self.bindings.insert(scope_name, transition_name);
        Ok(installed)
    }

    /// Stop dispatching a scope property; the watch stays installed
    pub fn unbind(&mut self, scope_property: &str) -> Option<String> {
        let removed = self.bindings.shift_remove(scope_property.trim());
        if removed.is_some() {
            tracing::debug!(scope_property, "unbind");
        }
        removed
    }

    pub fn transition_property(&self, scope_property: &str) -> Option<&str> {
        self.bindings.get(scope_property).map(String::as_str)
    }

    /// Current bindings, in the order they were first made
    pub fn bindings(&self) -> &IndexMap<String, String> {
        &self.bindings
    }

    pub fn is_watched(&self, scope_property: &str) -> bool {
        self.watches.contains_key(scope_property)
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Release every watch exactly once
    ///
    /// Returns the number released. The bindings are cleared as well.
    pub fn release(&mut self) -> usize {
        let watches = std::mem::take(&mut self.watches);
        let released = watches.len();
        for (_, mut watch) in watches {
            watch.unsubscribe();
        }
        self.bindings.clear();
        released
    }
}
