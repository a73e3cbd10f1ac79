//! The per-element transition engine
//!
//! A [`TransitionEngine`] joins one reactive scope to one element. Scope
//! properties are bound to transition properties; at the end of every
//! digest the engine collects the bound properties that changed, runs the
//! winning handler for each, lets every suite commit what its handlers
//! staged and finally fires the most recently added suite.
//!
//! ```rust
//! use fl_core::{Element, Injector, RecordingElement, Scope, Value};
//! use fl_transition::{Changes, TransitionConfig, TransitionEngine};
//! use std::rc::Rc;
//!
//! let scope = Scope::new();
//! let element = Rc::new(RecordingElement::new());
//! let engine = TransitionEngine::new(
//!     Rc::new(scope.clone()),
//!     element.clone(),
//!     Injector::new(),
//!     &TransitionConfig::default(),
//! )
//! .unwrap();
//!
//! engine.bind("x", "css-x").unwrap();
//! engine.apply(Changes::new().set("x", 40), None).unwrap();
//! scope.digest().unwrap();
//!
//! assert_eq!(element.css("left"), Value::from("40px"));
//! ```

use fl_core::{
    Element, Injector, ReactiveScope, ScopeEvent, Subscription, Value, ValueMap, WatchExpr,
    DESTROY_EVENT,
};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::apply::{Apply, Changes};
use crate::binder::{
    validate_binding, validate_binding_map, validate_binding_value, PropertyBinder,
};
use crate::config::TransitionConfig;
use crate::default_suite::DefaultSuite;
use crate::dispatch::{Cycle, DispatchController};
use crate::error::{Result, TransitionError};
use crate::params::FireParams;
use crate::state::StateMachine;
use crate::suite::{Flow, SuiteFactory, SuiteRegistry};

struct EngineInner {
    scope: Rc<dyn ReactiveScope>,
    element: Rc<dyn Element>,
    injector: Injector,
    binder: RefCell<PropertyBinder>,
    suites: RefCell<SuiteRegistry>,
    /// Names of the added suites, readable while the registry is dispatching
    suite_names: RefCell<Vec<String>>,
    states: RefCell<StateMachine>,
    dispatch: RefCell<DispatchController>,
    /// Digest hook and `$destroy` listener
    lifecycle: RefCell<Vec<Subscription>>,
    disposed: Cell<bool>,
}

/// Transition engine for one (scope, element) pair
///
/// Cheap to clone; clones drive the same engine.
#[derive(Clone)]
pub struct TransitionEngine {
    inner: Rc<EngineInner>,
}

impl TransitionEngine {
    /// Create an engine and hook it into the scope's digest
    ///
    /// The default suite is added first, then the configured bindings and
    /// states are applied.
    pub fn new(
        scope: Rc<dyn ReactiveScope>,
        element: Rc<dyn Element>,
        injector: Injector,
        config: &TransitionConfig,
    ) -> Result<Self> {
        let inner = Rc::new(EngineInner {
            scope,
            element,
            injector,
            binder: RefCell::new(PropertyBinder::new()),
            suites: RefCell::new(SuiteRegistry::new()),
            suite_names: RefCell::new(Vec::new()),
            states: RefCell::new(StateMachine::new()),
            dispatch: RefCell::new(DispatchController::new()),
            lifecycle: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        let digest_hook = inner.scope.on_digest(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_cycle();
            }
        }));
        let weak = Rc::downgrade(&inner);
        let destroy_listener = inner.scope.on(
            DESTROY_EVENT,
            Rc::new(move |_: &ScopeEvent| {
                if let Some(inner) = weak.upgrade() {
                    tracing::debug!("scope destroyed, disposing transition");
                    inner.dispose();
                }
            }),
        );
        inner
            .lifecycle
            .borrow_mut()
            .extend([digest_hook, destroy_listener]);

        let engine = Self { inner };
        engine.add_suite(&DefaultSuite::factory(config.default_display.clone()))?;
        engine.bind_values(&config.bindings)?;
        for (name, state) in &config.states {
            engine.state_config(name, state.values.clone(), state.fire_params());
        }
        Ok(engine)
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    /// Bind a scope property to a transition property
    pub fn bind(&self, scope_property: &str, transition_property: &str) -> Result<()> {
        self.install_binding(scope_property, transition_property, None)
    }

    /// Bind several pairs; nothing is bound if any pair is invalid
    pub fn bind_all<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<()> {
        let pairs = pairs
            .into_iter()
            .map(|(scope, transition)| validate_binding(scope, transition))
            .collect::<Result<Vec<_>>>()?;
        for (scope, transition) in pairs {
            self.bind(&scope, &transition)?;
        }
        Ok(())
    }

    /// Bind from dynamic values, e.g. read from configuration
    pub fn bind_value(&self, scope_property: &Value, transition_property: &Value) -> Result<()> {
        let (scope, transition) = validate_binding_value(scope_property, transition_property)?;
        self.bind(&scope, &transition)
    }

    /// Bind every entry of a scope property -> transition property hash
    pub fn bind_values(&self, bindings: &ValueMap) -> Result<()> {
        for (scope, transition) in validate_binding_map(bindings)? {
            self.bind(&scope, &transition)?;
        }
        Ok(())
    }

    /// Bind a derived expression under `name`
    ///
    /// Handlers receive the expression's value; `name` identifies the
    /// binding for [`TransitionEngine::unbind`]. Fails if `name` already
    /// has a watch. Retarget an existing expression binding with
    /// [`TransitionEngine::bind`].
    pub fn bind_expr(&self, name: &str, expr: WatchExpr, transition_property: &str) -> Result<()> {
        let (name, transition_property) = validate_binding(name, transition_property)?;
        if self.inner.binder.borrow().is_watched(&name) {
            return Err(TransitionError::AlreadyWatched { name });
        }
        self.install_binding(&name, &transition_property, Some(expr))
    }

    fn install_binding(
        &self,
        scope_property: &str,
        transition_property: &str,
        expr: Option<WatchExpr>,
    ) -> Result<()> {
        let weak = Rc::downgrade(&self.inner);
        let scope = self.inner.scope.clone();
        self.inner
            .binder
            .borrow_mut()
            .bind(scope_property, transition_property, |name: &str| {
                let key = name.to_string();
                let expr = expr.unwrap_or_else(|| WatchExpr::property(name));
                scope.watch(expr, Box::new(move |new: &Value, _old: &Value| {
                    observe(&weak, &key, new);
                }))
            })?;
        Ok(())
    }

    /// Stop dispatching a scope property
    pub fn unbind(&self, scope_property: &str) {
        self.inner.binder.borrow_mut().unbind(scope_property);
    }

    // =========================================================================
    // Apply and states
    // =========================================================================

    /// Write values to the scope (or run a callback against it)
    ///
    /// `params` go to the next dispatched cycle, replacing any pending ones.
    pub fn apply(&self, apply: impl Into<Apply>, params: Option<FireParams>) -> Result<()> {
        self.inner.ensure_live("apply")?;
        let written = apply.into().run(self.inner.scope.as_ref());
        tracing::debug!(properties = ?written, params = params.is_some(), "apply");
        self.inner.dispatch.borrow_mut().set_params(params);
        Ok(())
    }

    /// Define or overwrite a named state
    pub fn state_config(&self, name: &str, values: impl Into<Changes>, params: Option<FireParams>) {
        self.inner
            .states
            .borrow_mut()
            .config(name, values.into(), params);
    }

    /// Apply a named state
    ///
    /// Its properties dispatch on the next cycle even when the values did
    /// not change since the last trigger.
    pub fn state(&self, name: &str) -> Result<()> {
        self.inner.ensure_live("state")?;
        let state = self
            .inner
            .states
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownState {
                name: name.to_string(),
            })?;

        tracing::debug!(state = name, "state triggered");
        self.inner.dispatch.borrow_mut().force(state.values.names());
        self.apply(state.values, state.params)
    }

    // =========================================================================
    // Suites
    // =========================================================================

    /// Add a suite on top of precedence; its `fire` becomes the engine's
    pub fn add_suite(&self, factory: &dyn SuiteFactory) -> Result<usize> {
        self.inner.ensure_live("add_suite")?;
        let mut suites = self
            .inner
            .suites
            .try_borrow_mut()
            .map_err(|_| TransitionError::Busy {
                suite: factory.name().to_string(),
            })?;
        let index = suites.add(factory, &self.inner.injector)?;
        *self.inner.suite_names.borrow_mut() = suites.suite_names();
        Ok(index)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Suppress dispatch until [`TransitionEngine::resume`]
    pub fn halt(&self) {
        tracing::debug!("halt");
        self.inner.dispatch.borrow_mut().halt();
    }

    pub fn resume(&self) {
        tracing::debug!("resume");
        self.inner.dispatch.borrow_mut().resume();
    }

    pub fn is_halted(&self) -> bool {
        self.inner.dispatch.borrow().is_halted()
    }

    /// Release every watch and dispose every suite once
    ///
    /// Called automatically when the scope broadcasts `$destroy`.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn scope(&self) -> &Rc<dyn ReactiveScope> {
        &self.inner.scope
    }

    pub fn element(&self) -> &Rc<dyn Element> {
        &self.inner.element
    }

    pub fn transition_property(&self, scope_property: &str) -> Option<String> {
        self.inner
            .binder
            .borrow()
            .transition_property(scope_property)
            .map(str::to_string)
    }

    pub fn bindings(&self) -> IndexMap<String, String> {
        self.inner.binder.borrow().bindings().clone()
    }

    pub fn watch_count(&self) -> usize {
        self.inner.binder.borrow().watch_count()
    }

    pub fn suite_names(&self) -> Vec<String> {
        self.inner.suite_names.borrow().clone()
    }

    pub fn state_names(&self) -> Vec<String> {
        self.inner
            .states
            .borrow()
            .names()
            .map(str::to_string)
            .collect()
    }

    /// Cycles dispatched so far
    pub fn cycles(&self) -> u64 {
        self.inner.dispatch.borrow().cycles()
    }
}

impl fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("bindings", &self.inner.binder.borrow().bindings())
            .field("suites", &self.suite_names())
            .field("states", &self.state_names())
            .field("halted", &self.is_halted())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn observe(engine: &Weak<EngineInner>, scope_property: &str, value: &Value) {
    if let Some(inner) = engine.upgrade() {
        inner.dispatch.borrow_mut().observe(scope_property, value);
    }
}

impl EngineInner {
    fn ensure_live(&self, operation: &'static str) -> Result<()> {
        if self.disposed.get() {
            tracing::warn!(operation, "transition used after dispose");
            return Err(TransitionError::Disposed);
        }
        Ok(())
    }

    /// One dispatched cycle, run at the end of a digest
    fn run_cycle(&self) {
        if self.disposed.get() {
            return;
        }
        // A digest started from inside a handler or fire
        let Ok(mut suites) = self.suites.try_borrow_mut() else {
            tracing::warn!("nested digest while dispatching, cycle skipped");
            return;
        };

        let collected = {
            let binder = self.binder.borrow();
            self.dispatch.borrow_mut().collect(binder.bindings())
        };
        let Some(Cycle { changes, params }) = collected else {
            tracing::trace!("halted, cycle skipped");
            return;
        };
        if changes.is_empty() {
            return;
        }

        let mut vetoed = false;
        for change in &changes {
            let flow = suites.handle(&change.transition_property, &change.new, &change.old);
            if flow == Flow::Veto {
                tracing::trace!(property = %change.transition_property, "vetoed");
                vetoed = true;
            }
        }

        let element = self.element.as_ref();
        suites.commit_all(element, params.as_ref());
        if !vetoed {
            suites.fire(element, params.as_ref());
        }
        drop(suites);

        if !vetoed {
            if let Some(params) = &params {
                params.run_after_fire();
            }
        }
        // Disposed by a handler or fire while the registry was borrowed
        if self.disposed.get() {
            self.suites.borrow_mut().dispose_all();
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        let released = self.binder.borrow_mut().release();
        let lifecycle = std::mem::take(&mut *self.lifecycle.borrow_mut());
        for mut subscription in lifecycle {
            subscription.unsubscribe();
        }
        let suites = match self.suites.try_borrow_mut() {
            Ok(mut suites) => suites.dispose_all(),
            // run_cycle finishes the job once it releases the registry
            Err(_) => 0,
        };
        tracing::debug!(watches = released, suites, "transition disposed");
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{FnSuite, InjectedFactory, SuiteContext, TransitionSuite};
    use fl_core::{
        map_from_json, DigestHook, EventListener, RecordingElement, Scope, StyleMap, WatchListener,
    };
    use serde_json::json;

    /// Records what a test suite saw
    #[derive(Default)]
    struct Spy {
        handled: RefCell<Vec<(Value, Value)>>,
        fired: RefCell<Vec<Option<ValueMap>>>,
        disposed: Cell<usize>,
    }

    impl Spy {
        fn handled(&self) -> usize {
            self.handled.borrow().len()
        }

        fn fired(&self) -> usize {
            self.fired.borrow().len()
        }
    }

    fn spy_suite(
        spy: &Rc<Spy>,
        property: &'static str,
        flow: Flow,
    ) -> impl Fn(&mut SuiteContext) -> Result<Box<dyn TransitionSuite>> {
        let spy = spy.clone();
        move |ctx: &mut SuiteContext| {
            let handled = spy.clone();
            ctx.register(property, move |new: &Value, old: &Value| {
                handled.handled.borrow_mut().push((new.clone(), old.clone()));
                flow
            })?;
            let fired = spy.clone();
            let disposed = spy.clone();
            Ok(FnSuite::new("spy")
                .on_fire(move |_: &dyn Element, params: Option<&FireParams>| {
                    fired
                        .fired
                        .borrow_mut()
                        .push(params.map(|params| params.values().clone()));
                })
                .on_dispose(move || disposed.disposed.set(disposed.disposed.get() + 1))
                .boxed())
        }
    }

    struct Harness {
        scope: Scope,
        element: Rc<RecordingElement>,
        engine: TransitionEngine,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(Injector::new(), &TransitionConfig::default(), RecordingElement::new())
        }

        fn with(injector: Injector, config: &TransitionConfig, element: RecordingElement) -> Self {
            let scope = Scope::new();
            let element = Rc::new(element);
            let engine =
                TransitionEngine::new(Rc::new(scope.clone()), element.clone(), injector, config)
                    .unwrap();
            Self {
                scope,
                element,
                engine,
            }
        }

        /// Engine with a spy suite handling `test`, bound from `prop`
        fn with_spy() -> (Self, Rc<Spy>) {
            let harness = Self::new();
            let spy = Rc::new(Spy::default());
            harness
                .engine
                .add_suite(&spy_suite(&spy, "test", Flow::Continue))
                .unwrap();
            harness.engine.bind("prop", "test").unwrap();
            (harness, spy)
        }

        fn digest(&self) {
            self.scope.digest().unwrap();
        }

        fn set(&self, name: &str, value: impl Into<Value>) {
            self.scope.set(name, value.into());
        }
    }

    fn style(json: serde_json::Value) -> StyleMap {
        map_from_json(json)
    }

    #[test]
    fn test_bind_installs_one_watch_per_scope_property() {
        let harness = Harness::new();
        harness.engine.bind("property", "trans-property").unwrap();
        harness
            .engine
            .bind("property", "different-trans-property")
            .unwrap();

        assert_eq!(harness.scope.watcher_count(), 1);
        assert_eq!(
            harness.engine.transition_property("property").as_deref(),
            Some("different-trans-property")
        );
    }

    #[test]
    fn test_bind_hash() {
        let harness = Harness::new();
        harness
            .engine
            .bind_values(&map_from_json(json!({"property": "trans-property"})))
            .unwrap();
        assert_eq!(harness.scope.watcher_count(), 1);
        assert!(harness.engine.bindings().contains_key("property"));
    }

    #[test]
    fn test_invalid_bind_params() {
        let engine = Harness::new().engine;
        let message = |result: Result<()>| result.unwrap_err().to_string();

        assert_eq!(
            message(engine.bind_value(&Value::from(123), &Value::Undefined)),
            "Cannot bind scope property '123'"
        );
        assert_eq!(
            message(engine.bind_value(&Value::from("123"), &Value::from(123))),
            "Cannot bind transition property '123'"
        );
        assert_eq!(message(engine.bind("", "")), "Cannot bind scope property ''");
        assert_eq!(
            message(engine.bind("123", "")),
            "Cannot bind transition property ''"
        );
        assert_eq!(
            message(engine.bind_values(&map_from_json(json!({"123": {}})))),
            "Cannot bind transition property '{}'"
        );
        assert_eq!(engine.watch_count(), 0);
    }

    #[test]
    fn test_bind_all_is_all_or_nothing() {
        let engine = Harness::new().engine;
        assert!(engine.bind_all([("x", "css-x"), ("y", " ")]).is_err());
        assert_eq!(engine.watch_count(), 0);

        engine.bind_all([("x", "css-x"), ("y", "css-y")]).unwrap();
        assert_eq!(engine.watch_count(), 2);
    }

    #[test]
    fn test_apply_writes_hash_to_scope() {
        let harness = Harness::new();
        harness
            .engine
            .apply(map_from_json(json!({"x": 123, "y": "100%"})), None)
            .unwrap();
        assert_eq!(harness.scope.get("x"), Value::from(123));
        assert_eq!(harness.scope.get("y"), Value::from("100%"));
    }

    #[test]
    fn test_configure_and_apply_state() {
        let harness = Harness::new();
        harness
            .engine
            .state_config("state1", Changes::new().set("x", 123).set("y", "100%"), None);
        harness.engine.state("state1").unwrap();
        assert_eq!(harness.scope.get("x"), Value::from(123));
        assert_eq!(harness.scope.get("y"), Value::from("100%"));

        let err = harness.engine.state("missing").unwrap_err();
        assert_eq!(err.to_string(), "Unknown transition state 'missing'");
    }

    #[test]
    fn test_apply_runs_callbacks_and_computed_values() {
        let harness = Harness::new();
        let called = Rc::new(Cell::new(0));
        let counter = called.clone();
        harness
            .engine
            .apply(Apply::call(move |_: &dyn ReactiveScope| counter.set(counter.get() + 1)), None)
            .unwrap();
        assert_eq!(called.get(), 1);

        harness
            .engine
            .apply(Changes::new().computed("test", || Value::from("abc")), None)
            .unwrap();
        assert_eq!(harness.scope.get("test"), Value::from("abc"));
    }

    #[test]
    fn test_handlers_get_new_and_old_values() {
        let (harness, spy) = Harness::with_spy();
        for value in [0, 1, 2] {
            harness.set("prop", value);
            harness.digest();
        }
        assert_eq!(
            spy.handled.borrow().last(),
            Some(&(Value::from(2), Value::from(1)))
        );
    }

    #[test]
    fn test_fires_only_in_cycles_with_changes() {
        let (harness, spy) = Harness::with_spy();
        harness.digest();
        harness.set("prop", 10);
        harness.digest();
        harness.set("prop", 3);
        harness.digest();
        harness.digest();
        harness.digest();

        assert_eq!(spy.handled(), 3);
        assert_eq!(spy.fired(), 3);
    }

    #[test]
    fn test_trims_binding_names() {
        let (harness, spy) = Harness::with_spy();
        harness.engine.bind(" test2 ", " test ").unwrap();
        harness.set("test2", "testValue");
        harness.digest();

        assert!(spy
            .handled
            .borrow()
            .contains(&(Value::from("testValue"), Value::from("testValue"))));
    }

    #[test]
    fn test_halt_suppresses_dispatch() {
        let (harness, spy) = Harness::with_spy();
        harness.engine.halt();
        harness.digest();
        assert!(harness.engine.is_halted());
        assert_eq!(spy.handled(), 0);
        assert_eq!(spy.fired(), 0);
    }

    #[test]
    fn test_resume_restores_dispatch() {
        let (harness, spy) = Harness::with_spy();
        harness.engine.halt();
        harness.engine.resume();
        harness.digest();
        assert_eq!(spy.handled(), 1);
    }

    #[test]
    fn test_changes_while_halted_dispatch_after_resume() {
        let (harness, spy) = Harness::with_spy();
        harness.set("prop", 1);
        harness.digest();

        harness.engine.halt();
        harness.set("prop", 2);
        harness.digest();
        harness.engine.resume();
        harness.digest();

        assert_eq!(
            spy.handled.borrow().last(),
            Some(&(Value::from(2), Value::from(1)))
        );
        assert_eq!(spy.fired(), 2);
    }

    #[test]
    fn test_fire_params_belong_to_one_cycle() {
        let (harness, spy) = Harness::with_spy();
        harness.engine.state_config(
            "test2",
            Changes::new().set("prop", 123),
            Some(FireParams::new().with("a", "value2")),
        );
        harness.digest();

        harness
            .engine
            .apply(
                Changes::new().set("prop", 654),
                Some(FireParams::new().with("a", "value1")),
            )
            .unwrap();
        harness.digest();

        harness.set("prop", 12345);
        harness.digest();

        harness.engine.state("test2").unwrap();
        harness.digest();

        let fired = spy.fired.borrow();
        let a = |index: usize| {
            fired[index]
                .as_ref()
                .map(|values| values["a"].clone())
        };
        assert_eq!(fired.len(), 4);
        assert_eq!(a(0), None);
        assert_eq!(a(1), Some(Value::from("value1")));
        assert_eq!(a(2), None);
        assert_eq!(a(3), Some(Value::from("value2")));
    }

    #[test]
    fn test_state_fires_on_every_trigger() {
        let (harness, spy) = Harness::with_spy();
        harness.engine.state_config(
            "test",
            Changes::new().set("prop", 123),
            Some(FireParams::new().with("a", "value")),
        );
        harness.engine.state("test").unwrap();
        harness.digest();
        harness.engine.state("test").unwrap();
        harness.digest();

        assert_eq!(spy.fired(), 2);
        assert!(spy
            .fired
            .borrow()
            .iter()
            .all(|params| params.as_ref().map(|p| p["a"].clone()) == Some(Value::from("value"))));
    }

    #[test]
    fn test_default_suite_writes_one_style_batch() {
        let harness = Harness::new();
        harness
            .engine
            .bind_values(&map_from_json(json!({
                "x": "css-x",
                "y": "css-y",
                "width": "css-width",
                "height": "css-height",
                "opacity": "css-opacity",
            })))
            .unwrap();
        harness
            .engine
            .apply(
                map_from_json(json!({
                    "x": 1,
                    "y": 2,
                    "width": "100%",
                    "height": 200,
                    "opacity": 0.5,
                })),
                None,
            )
            .unwrap();
        harness.digest();

        assert_eq!(
            harness.element.batches(),
            vec![style(json!({
                "left": "1px",
                "top": "2px",
                "width": "100%",
                "height": "200px",
                "opacity": 0.5,
                "-moz-opacity": 0.5,
                "filter": "alpha(opacity=50)",
            }))]
        );
    }

    #[test]
    fn test_hidden_binding_toggles_display() {
        let harness = Harness::with(
            Injector::new(),
            &TransitionConfig::default(),
            RecordingElement::with_style([("display".to_string(), "inline".into())]),
        );
        harness.engine.bind("hidden", "css-hidden").unwrap();
        harness.set("hidden", true);
        harness.digest();
        harness.set("hidden", false);
        harness.digest();

        assert_eq!(
            harness.element.batches(),
            vec![
                style(json!({"display": "none"})),
                style(json!({"display": "inline"})),
            ]
        );
    }

    #[test]
    fn test_last_added_suite_wins() {
        let (harness, first) = Harness::with_spy();
        let second = Rc::new(Spy::default());
        harness
            .engine
            .add_suite(&spy_suite(&second, "test", Flow::Continue))
            .unwrap();
        harness.set("prop", 123);
        harness.digest();

        assert_eq!(first.handled(), 0);
        assert_eq!(second.handled(), 1);
        assert_eq!(first.fired(), 0);
        assert_eq!(second.fired(), 1);
    }

    #[test]
    fn test_reserved_property_is_rejected() {
        let harness = Harness::new();
        let factory = |ctx: &mut SuiteContext| -> Result<Box<dyn TransitionSuite>> {
            ctx.register("noop", |_: &Value, _: &Value| {})?;
            Ok(FnSuite::new("reserved")
                .on_fire(|_: &dyn Element, _: Option<&FireParams>| {})
                .boxed())
        };
        let err = harness.engine.add_suite(&factory).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot register transition property 'noop' it is reserved."
        );
        assert_eq!(harness.engine.suite_names(), vec!["default"]);
    }

    #[test]
    fn test_veto_suppresses_fire() {
        let (harness, spy) = Harness::with_spy();
        let vetoing = Rc::new(Spy::default());
        harness
            .engine
            .add_suite(&spy_suite(&vetoing, "test", Flow::Veto))
            .unwrap();
        harness.engine.bind("tester", "test").unwrap();
        harness.set("tester", 123);
        harness.digest();

        assert_eq!(vetoing.handled(), 2);
        assert_eq!(vetoing.fired(), 0);
        assert_eq!(spy.fired(), 0);
    }

    #[test]
    fn test_after_fire_runs_after_fire() {
        let (harness, spy) = Harness::with_spy();
        let fired_before = Rc::new(Cell::new(None));
        let seen = fired_before.clone();
        let observed = spy.clone();
        harness
            .engine
            .apply(
                Changes::new().set("prop", "value"),
                Some(FireParams::new().after_fire(move || seen.set(Some(observed.fired())))),
            )
            .unwrap();
        harness.digest();

        assert_eq!(fired_before.get(), Some(1));
    }

    #[test]
    fn test_unbind_stops_dispatch() {
        let (harness, spy) = Harness::with_spy();
        harness.digest();
        assert_eq!(spy.fired(), 1);

        harness.engine.unbind("prop");
        harness.set("prop", "123");
        harness.digest();
        assert_eq!(spy.fired(), 1);
        assert_eq!(harness.scope.watcher_count(), 1);
    }

    #[test]
    fn test_dispose_disposes_suites_once_and_stops_dispatch() {
        let (harness, spy) = Harness::with_spy();
        harness.engine.dispose();
        harness.engine.dispose();
        assert_eq!(spy.disposed.get(), 1);
        assert_eq!(harness.scope.watcher_count(), 0);

        harness.set("prop", 1);
        harness.digest();
        assert_eq!(spy.handled(), 0);
        assert_eq!(
            harness.engine.apply(Changes::new().set("prop", 2), None),
            Err(TransitionError::Disposed)
        );
    }

    /// Scope wrapper counting released watches
    struct CountingScope {
        scope: Scope,
        released: Rc<Cell<usize>>,
    }

    impl ReactiveScope for CountingScope {
        fn get(&self, name: &str) -> Value {
            self.scope.get(name)
        }

        fn set(&self, name: &str, value: Value) {
            self.scope.set(name, value)
        }

        fn watch(&self, expr: WatchExpr, listener: WatchListener) -> Subscription {
            let mut watch = self.scope.watch(expr, listener);
            let released = self.released.clone();
            Subscription::new(move || {
                released.set(released.get() + 1);
                watch.unsubscribe();
            })
        }

        fn on(&self, event: &str, listener: EventListener) -> Subscription {
            self.scope.on(event, listener)
        }

        fn on_digest(&self, hook: DigestHook) -> Subscription {
            self.scope.on_digest(hook)
        }
    }

    #[test]
    fn test_scope_destroy_releases_each_watch_once() {
        let scope = Scope::new();
        let released = Rc::new(Cell::new(0));
        let engine = TransitionEngine::new(
            Rc::new(CountingScope {
                scope: scope.clone(),
                released: released.clone(),
            }),
            Rc::new(RecordingElement::new()),
            Injector::new(),
            &TransitionConfig::default(),
        )
        .unwrap();
        engine.bind("x", "x").unwrap();
        engine.bind("x", "css-x").unwrap();
        scope.digest().unwrap();

        scope.destroy();
        assert!(engine.is_disposed());
        assert_eq!(released.get(), 1);

        engine.dispose();
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn test_default_suite_calls_on_complete() {
        let (harness, _spy) = Harness::with_spy();
        let completed = Rc::new(Cell::new(0));
        let counter = completed.clone();
        harness.engine.bind("x", "css-x").unwrap();
        harness
            .engine
            .apply(
                Changes::new().set("x", "value"),
                Some(FireParams::new().on_complete(move || counter.set(counter.get() + 1))),
            )
            .unwrap();
        harness.digest();

        assert_eq!(completed.get(), 1);
        assert_eq!(harness.element.css("left"), Value::from("value"));
    }

    #[test]
    fn test_suites_receive_declared_dependencies() {
        let mut injector = Injector::new();
        injector.provide("transition", Rc::new(String::from("transition service")));
        let harness =
            Harness::with(injector, &TransitionConfig::default(), RecordingElement::new());

        let received = Rc::new(RefCell::new(None));
        let sink = received.clone();
        let factory =
            InjectedFactory::new("injected", &["transition"], move |ctx: &mut SuiteContext| {
                assert!(ctx.transition_props().is_empty());
                *sink.borrow_mut() = Some(ctx.dependency::<String>("transition")?);
                Ok(FnSuite::new("injected")
                    .on_fire(|_: &dyn Element, _: Option<&FireParams>| {})
                    .boxed())
            });
        harness.engine.add_suite(&factory).unwrap();

        assert_eq!(
            received.borrow().as_deref().map(String::as_str),
            Some("transition service")
        );
        assert_eq!(harness.engine.suite_names(), vec!["default", "injected"]);
    }

    #[test]
    fn test_add_suite_while_dispatching_is_busy() {
        let harness = Harness::new();
        let slot: Rc<RefCell<Option<TransitionEngine>>> = Rc::new(RefCell::new(None));
        let outcome = Rc::new(RefCell::new(None));

        let engine = slot.clone();
        let result = outcome.clone();
        let factory = move |ctx: &mut SuiteContext| -> Result<Box<dyn TransitionSuite>> {
            let engine = engine.clone();
            let result = result.clone();
            ctx.register("reentrant", move |_: &Value, _: &Value| {
                if let Some(engine) = engine.borrow().as_ref() {
                    let late = |_: &mut SuiteContext| -> Result<Box<dyn TransitionSuite>> {
                        Ok(FnSuite::new("late")
                            .on_fire(|_: &dyn Element, _: Option<&FireParams>| {})
                            .boxed())
                    };
                    *result.borrow_mut() = Some(engine.add_suite(&late));
                }
            })?;
            Ok(FnSuite::new("reentrant")
                .on_fire(|_: &dyn Element, _: Option<&FireParams>| {})
                .boxed())
        };
        harness.engine.add_suite(&factory).unwrap();
        harness.engine.bind("prop", "reentrant").unwrap();
        *slot.borrow_mut() = Some(harness.engine.clone());

        harness.digest();
        assert!(matches!(
            outcome.borrow_mut().take(),
            Some(Err(TransitionError::Busy { .. }))
        ));
        slot.borrow_mut().take();
    }

    #[test]
    fn test_config_bindings_and_states() {
        let config = TransitionConfig::from_toml_str(
            r#"
default_display = "inline"

[bindings]
x = "css-x"
hidden = "css-hidden"

[states.open]
values = { x = 10, hidden = false }

[states.closed]
values = { x = -200, hidden = true }
"#,
        )
        .unwrap();
        let harness = Harness::with(Injector::new(), &config, RecordingElement::new());
        assert_eq!(harness.engine.state_names(), vec!["open", "closed"]);

        harness.engine.state("closed").unwrap();
        harness.digest();
        assert_eq!(harness.element.css("left"), Value::from("-200px"));
        assert_eq!(harness.element.css("display"), Value::from("none"));

        harness.engine.state("open").unwrap();
        harness.digest();
        assert_eq!(harness.element.css("left"), Value::from("10px"));
        assert_eq!(harness.element.css("display"), Value::from("inline"));
    }

    #[test]
    fn test_derived_expression_binding() {
        let (harness, spy) = Harness::with_spy();
        harness
            .engine
            .bind_expr(
                "area",
                WatchExpr::derived(|scope: &dyn ReactiveScope| {
                    let width = scope.get("w").as_f64().unwrap_or(0.0);
                    let height = scope.get("h").as_f64().unwrap_or(0.0);
                    Value::from(width * height)
                }),
                "test",
            )
            .unwrap();
        harness.set("w", 3);
        harness.set("h", 4);
        harness.digest();

        assert!(spy
            .handled
            .borrow()
            .contains(&(Value::from(12), Value::from(12))));
    }

    #[test]
    fn test_accessors_are_readable_from_fire() {
        let harness = Harness::new();
        let slot: Rc<RefCell<Option<TransitionEngine>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(None));

        let engine = slot.clone();
        let sink = seen.clone();
        let factory = move |_: &mut SuiteContext| -> Result<Box<dyn TransitionSuite>> {
            let engine = engine.clone();
            let sink = sink.clone();
            Ok(FnSuite::new("inspect")
                .on_fire(move |_: &dyn Element, _: Option<&FireParams>| {
                    if let Some(engine) = engine.borrow().as_ref() {
                        *sink.borrow_mut() = Some((engine.suite_names(), format!("{engine:?}")));
                    }
                })
                .boxed())
        };
        harness.engine.add_suite(&factory).unwrap();
        harness.engine.bind("x", "css-x").unwrap();
        *slot.borrow_mut() = Some(harness.engine.clone());

        harness.set("x", 10);
        harness.digest();

        let (names, debug) = seen.borrow_mut().take().unwrap();
        assert_eq!(names, vec!["default", "inspect"]);
        assert!(debug.contains("inspect"));
        assert_eq!(harness.element.css("left"), Value::from("10px"));
        slot.borrow_mut().take();
    }

    #[test]
    fn test_bind_expr_rejects_watched_name() {
        let harness = Harness::new();
        harness.engine.bind("x", "css-x").unwrap();

        let err = harness
            .engine
            .bind_expr(
                " x ",
                WatchExpr::derived(|_: &dyn ReactiveScope| Value::from(1)),
                "css-y",
            )
            .unwrap_err();
        assert_eq!(err, TransitionError::AlreadyWatched { name: "x".into() });
        assert_eq!(
            err.to_string(),
            "Cannot bind expression 'x', the scope property is already watched"
        );
        assert_eq!(harness.engine.transition_property("x").as_deref(), Some("css-x"));
        assert_eq!(harness.scope.watcher_count(), 1);
    }

    #[test]
    fn test_vetoed_cycle_commits_and_completes_without_fire() {
        let harness = Harness::new();
        let spy = Rc::new(Spy::default());
        harness
            .engine
            .add_suite(&spy_suite(&spy, "test", Flow::Veto))
            .unwrap();
        harness.engine.bind("prop", "test").unwrap();
        harness.engine.bind("x", "css-x").unwrap();

        let completed = Rc::new(Cell::new(0));
        let after_fire = Rc::new(Cell::new(0));
        let on_complete = completed.clone();
        let after = after_fire.clone();
        harness
            .engine
            .apply(
                Changes::new().set("prop", 1).set("x", 5),
                Some(
                    FireParams::new()
                        .on_complete(move || on_complete.set(on_complete.get() + 1))
                        .after_fire(move || after.set(after.get() + 1)),
                ),
            )
            .unwrap();
        harness.digest();

        assert_eq!(spy.handled(), 1);
        assert_eq!(spy.fired(), 0);
        assert_eq!(harness.element.css("left"), Value::from("5px"));
        assert_eq!(completed.get(), 1);
        assert_eq!(after_fire.get(), 0);
    }
}
