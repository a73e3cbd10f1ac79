//! Transition suites and the handler registry
//!
//! A suite is a bundle of property handlers plus one `fire` entrypoint.
//! Suites are built by a [`SuiteFactory`], which receives a
//! [`SuiteContext`] to register handlers into and the dependencies it
//! declared, already resolved.
//!
//! # Precedence
//!
//! Each transition property maps to a small stack of handlers. Registering
//! a property pushes onto its stack and dispatch only ever calls the top,
//! so the most recently added suite wins. Shadowed handlers stay in place
//! but are unreachable.
//!
//! ```rust
//! use fl_core::{Element, Value};
//! use fl_transition::suite::{FnSuite, SuiteContext};
//! use fl_transition::{FireParams, Flow, TransitionSuite};
//!
//! fn slide(ctx: &mut SuiteContext) -> fl_transition::Result<Box<dyn TransitionSuite>> {
//!     ctx.register("slide-offset", |new: &Value, _old: &Value| {
//!         if new.is_undefined() { Flow::Veto } else { Flow::Continue }
//!     })?;
//!     Ok(FnSuite::new("slide")
//!         .on_fire(|_element: &dyn Element, _params: Option<&FireParams>| {})
//!         .boxed())
//! }
//! ```

use fl_core::{Dependencies, Element, Injector, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, TransitionError};
use crate::params::FireParams;

/// Sentinel handler name used for transition properties no suite handles
pub const NOOP: &str = "noop";

/// Names no suite may register
pub const RESERVED_PROPERTIES: &[&str] = &[NOOP];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_PROPERTIES.contains(&name)
}

/// What a handler wants for the current cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Flow {
    /// Let the cycle fire
    #[default]
    Continue,
    /// Suppress fire for this cycle
    Veto,
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::Continue
    }
}

impl From<bool> for Flow {
    /// `false` vetoes, matching handlers written as predicates
    fn from(proceed: bool) -> Self {
        if proceed {
            Flow::Continue
        } else {
            Flow::Veto
        }
    }
}

/// Property handler invoked with `(new, old)`
pub type Handler = Box<dyn FnMut(&Value, &Value) -> Flow>;

/// A pluggable bundle of property handlers with a fire entrypoint
pub trait TransitionSuite {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether [`TransitionSuite::fire`] does anything
    ///
    /// Suites assembled at runtime return `false` when no fire callback
    /// was supplied; adding such a suite is rejected.
    fn implements_fire(&self) -> bool {
        true
    }

    /// Apply work batched by this suite's handlers
    ///
    /// Called on every suite, in registration order, once per dispatched
    /// cycle after all handlers ran.
    fn commit(&mut self, _element: &dyn Element, _params: Option<&FireParams>) {}

    /// The cycle's side effect, only called on the most recently added suite
    fn fire(&mut self, element: &dyn Element, params: Option<&FireParams>);

    /// Release resources; called once when the engine is disposed
    fn dispose(&mut self) {}
}

// =============================================================================
// Construction
// =============================================================================

/// Registration context handed to a suite factory
pub struct SuiteContext {
    staged: Vec<(String, Handler)>,
    transition_props: Vec<String>,
    dependencies: Dependencies,
}

impl SuiteContext {
    pub(crate) fn new(dependencies: Dependencies) -> Self {
        Self {
            staged: Vec::new(),
            transition_props: Vec::new(),
            dependencies,
        }
    }

    /// Register a handler for a transition property
    ///
    /// The handler may return [`Flow`], `bool` (`false` vetoes) or `()`.
    pub fn register<F, R>(&mut self, name: &str, mut handler: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> R + 'static,
        R: Into<Flow>,
    {
        let name = name.trim();
        if is_reserved(name) {
            return Err(TransitionError::ReservedProperty {
                name: name.to_string(),
            });
        }
        if !self.transition_props.iter().any(|p| p == name) {
            self.transition_props.push(name.to_string());
        }
        self.staged.push((
            name.to_string(),
            Box::new(move |new: &Value, old: &Value| handler(new, old).into()),
        ));
        Ok(())
    }

    /// Transition properties this suite has registered so far
    pub fn transition_props(&self) -> &[String] {
        &self.transition_props
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Fetch one declared dependency
    pub fn dependency<T: Any>(&self, name: &str) -> Result<Rc<T>> {
        Ok(self.dependencies.get::<T>(name)?)
    }
}

/// Builds a suite
pub trait SuiteFactory {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Names to resolve from the engine's injector
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    fn create(&self, ctx: &mut SuiteContext) -> Result<Box<dyn TransitionSuite>>;
}

impl<F> SuiteFactory for F
where
    F: Fn(&mut SuiteContext) -> Result<Box<dyn TransitionSuite>>,
{
    fn create(&self, ctx: &mut SuiteContext) -> Result<Box<dyn TransitionSuite>> {
        self(ctx)
    }
}

/// A factory closure with declared dependencies
pub struct InjectedFactory<F> {
    name: String,
    dependencies: Vec<&'static str>,
    build: F,
}

impl<F> InjectedFactory<F>
where
    F: Fn(&mut SuiteContext) -> Result<Box<dyn TransitionSuite>>,
{
    pub fn new(name: impl Into<String>, dependencies: &[&'static str], build: F) -> Self {
        Self {
            name: name.into(),
            dependencies: dependencies.to_vec(),
            build,
        }
    }
}

impl<F> SuiteFactory for InjectedFactory<F>
where
    F: Fn(&mut SuiteContext) -> Result<Box<dyn TransitionSuite>>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[&str] {
        &self.dependencies
    }

    fn create(&self, ctx: &mut SuiteContext) -> Result<Box<dyn TransitionSuite>> {
        (self.build)(ctx)
    }
}

type FireFn = Box<dyn FnMut(&dyn Element, Option<&FireParams>)>;

/// Suite assembled from closures
pub struct FnSuite {
    name: String,
    fire: Option<FireFn>,
    dispose: Option<Box<dyn FnMut()>>,
}

impl FnSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fire: None,
            dispose: None,
        }
    }

    pub fn on_fire(mut self, f: impl FnMut(&dyn Element, Option<&FireParams>) + 'static) -> Self {
        self.fire = Some(Box::new(f));
        self
    }

    pub fn on_dispose(mut self, f: impl FnMut() + 'static) -> Self {
        self.dispose = Some(Box::new(f));
        self
    }

    pub fn boxed(self) -> Box<dyn TransitionSuite> {
        Box::new(self)
    }
}

impl TransitionSuite for FnSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn implements_fire(&self) -> bool {
        self.fire.is_some()
    }

    fn fire(&mut self, element: &dyn Element, params: Option<&FireParams>) {
        if let Some(fire) = self.fire.as_mut() {
            fire(element, params);
        }
    }

    fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.as_mut() {
            dispose();
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

struct HandlerEntry {
    suite: usize,
    handler: Handler,
}

struct SuiteSlot {
    suite: Box<dyn TransitionSuite>,
    disposed: bool,
}

/// Ordered suites and their handler stacks
#[derive(Default)]
pub struct SuiteRegistry {
    handlers: FxHashMap<String, SmallVec<[HandlerEntry; 2]>>,
    suites: Vec<SuiteSlot>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a suite and make it the top of precedence
    ///
    /// Handlers registered by the factory only become visible once the
    /// whole construction succeeded. Returns the suite's index.
    pub fn add(&mut self, factory: &dyn SuiteFactory, injector: &Injector) -> Result<usize> {
        let dependencies = injector.resolve(factory.dependencies())?;
        let mut ctx = SuiteContext::new(dependencies);
        let suite = factory.create(&mut ctx)?;
        if !suite.implements_fire() {
            return Err(TransitionError::MissingFire {
                suite: suite.name().to_string(),
            });
        }

        let index = self.suites.len();
        tracing::debug!(
            suite = suite.name(),
            index,
            properties = ?ctx.transition_props,
            "transition suite added"
        );
        for (name, handler) in ctx.staged {
            self.handlers
                .entry(name)
                .or_default()
                .push(HandlerEntry {
                    suite: index,
                    handler,
                });
        }
        self.suites.push(SuiteSlot {
            suite,
            disposed: false,
        });
        Ok(index)
    }

    /// Run the top handler for a transition property
    ///
    /// Properties nobody handles go to the `noop` sentinel, which never vetoes.
    pub fn handle(&mut self, property: &str, new: &Value, old: &Value) -> Flow {
        match self.handlers.get_mut(property).and_then(|stack| stack.last_mut()) {
            Some(entry) => {
                tracing::trace!(property, suite = entry.suite, %new, %old, "handler");
                (entry.handler)(new, old)
            }
            None => {
                tracing::trace!(property, handler = NOOP, "unhandled transition property");
                Flow::Continue
            }
        }
    }

    /// Index of the suite whose handler wins for `property`
    pub fn handler_owner(&self, property: &str) -> Option<usize> {
        self.handlers
            .get(property)
            .and_then(|stack| stack.last())
            .map(|entry| entry.suite)
    }

    /// Number of handlers (shadowed included) registered for `property`
    pub fn handler_depth(&self, property: &str) -> usize {
        self.handlers.get(property).map_or(0, |stack| stack.len())
    }

    pub fn commit_all(&mut self, element: &dyn Element, params: Option<&FireParams>) {
        for slot in self.suites.iter_mut().filter(|slot| !slot.disposed) {
            slot.suite.commit(element, params);
        }
    }

    /// Fire the most recently added suite; false when there is none
    pub fn fire(&mut self, element: &dyn Element, params: Option<&FireParams>) -> bool {
        match self.suites.last_mut() {
            Some(slot) if !slot.disposed => {
                tracing::trace!(suite = slot.suite.name(), "fire");
                slot.suite.fire(element, params);
                true
            }
            _ => false,
        }
    }

    /// Dispose every suite once, in registration order
    pub fn dispose_all(&mut self) -> usize {
        let mut disposed = 0;
        for slot in self.suites.iter_mut().filter(|slot| !slot.disposed) {
            slot.suite.dispose();
            slot.disposed = true;
            disposed += 1;
        }
        disposed
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    pub fn suite_names(&self) -> Vec<String> {
        self.suites
            .iter()
            .map(|slot| slot.suite.name().to_string())
            .collect()
    }
}

impl fmt::Debug for SuiteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteRegistry")
            .field("suites", &self.suite_names())
            .field("properties", &self.handlers.len())
            .finish()
    }
}
