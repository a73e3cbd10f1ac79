//! Reactive scopes with dirty-checking digests
//!
//! A [`Scope`] is the data context a layout element renders from. Properties
//! are plain [`Value`]s; nothing happens when one is written. Change
//! detection runs when the owner calls [`Scope::digest`]:
//!
//! 1. Every watch expression is evaluated and compared with the value seen
//!    on the previous pass. Changed watches invoke their listener with
//!    `(new, old)`; on the very first pass `old` equals `new`.
//! 2. Passes repeat until no watch changes (listeners may write properties),
//!    bounded by a TTL.
//! 3. Digest hooks run once the scope has settled.
//!
//! Consumers that should not depend on this concrete type program against
//! [`ReactiveScope`].
//!
//! ```rust
//! use fl_core::scope::{Scope, WatchExpr};
//! use fl_core::Value;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let scope = Scope::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! let _watch = scope.watch(
//!     WatchExpr::property("x"),
//!     Box::new(move |new: &Value, _old: &Value| log.borrow_mut().push(new.clone())),
//! );
//!
//! scope.set("x", 1.into());
//! scope.digest().unwrap();
//! assert_eq!(seen.borrow().len(), 1);
//! ```

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

use crate::subscription::Subscription;
use crate::value::Value;

/// Event broadcast when a scope is torn down
pub const DESTROY_EVENT: &str = "$destroy";

/// Maximum digest passes before giving up
pub const DEFAULT_DIGEST_TTL: usize = 10;

new_key_type! {
    /// Identifier of an installed watch
    pub struct WatchId;
    /// Identifier of an event listener
    pub struct ListenerId;
    /// Identifier of a digest hook
    pub struct DigestHookId;
}

/// Callback invoked with `(new, old)` when a watch expression changes
pub type WatchListener = Box<dyn FnMut(&Value, &Value)>;

/// Callback for scope events
pub type EventListener = Rc<dyn Fn(&ScopeEvent)>;

/// Callback run after a digest has settled
pub type DigestHook = Rc<dyn Fn()>;

/// What a watch observes
#[derive(Clone)]
pub enum WatchExpr {
    /// A named scope property
    Property(String),
    /// A value computed from the scope (or anything else) on every pass
    Derived(Rc<dyn Fn(&dyn ReactiveScope) -> Value>),
}

impl WatchExpr {
    pub fn property(name: impl Into<String>) -> Self {
        WatchExpr::Property(name.into())
    }

    pub fn derived(f: impl Fn(&dyn ReactiveScope) -> Value + 'static) -> Self {
        WatchExpr::Derived(Rc::new(f))
    }

    /// Evaluate against a scope
    pub fn evaluate(&self, scope: &dyn ReactiveScope) -> Value {
        match self {
            WatchExpr::Property(name) => scope.get(name),
            WatchExpr::Derived(f) => f(scope),
        }
    }
}

impl fmt::Debug for WatchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchExpr::Property(name) => f.debug_tuple("Property").field(name).finish(),
            WatchExpr::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<&str> for WatchExpr {
    fn from(name: &str) -> Self {
        WatchExpr::property(name)
    }
}

impl From<String> for WatchExpr {
    fn from(name: String) -> Self {
        WatchExpr::Property(name)
    }
}

/// An event delivered to scope listeners
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeEvent {
    pub name: String,
    pub payload: Value,
}

/// Scope errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScopeError {
    /// Watch listeners kept changing the scope
    #[error("{ttl} digest iterations reached without the scope settling")]
    InfiniteDigest { ttl: usize },

    /// `digest` called from inside a watch listener
    #[error("digest already in progress")]
    DigestInProgress,

    /// The scope was destroyed
    #[error("scope has been destroyed")]
    Destroyed,
}

/// Result type for scope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// The reactive-scope seam consumed by the transition engine
///
/// Registrations return a [`Subscription`]; releasing it must remove the
/// registration so the callback is never invoked again.
pub trait ReactiveScope {
    /// Read a property, `Undefined` when unset
    fn get(&self, name: &str) -> Value;

    /// Write a property; watchers see it on the next digest
    fn set(&self, name: &str, value: Value);

    /// Install a change watch
    fn watch(&self, expr: WatchExpr, listener: WatchListener) -> Subscription;

    /// Listen for a named event
    fn on(&self, event: &str, listener: EventListener) -> Subscription;

    /// Run `hook` at the end of every digest
    fn on_digest(&self, hook: DigestHook) -> Subscription;
}

struct WatchNode {
    expr: WatchExpr,
    /// Value seen on the previous pass, `None` before the first pass
    last: Option<Value>,
    /// Taken out while the listener runs
    listener: Option<WatchListener>,
}

struct ScopeInner {
    properties: RefCell<FxHashMap<String, Value>>,
    watchers: RefCell<SlotMap<WatchId, WatchNode>>,
    listeners: RefCell<SlotMap<ListenerId, (String, EventListener)>>,
    digest_hooks: RefCell<SlotMap<DigestHookId, DigestHook>>,
    digesting: Cell<bool>,
    destroyed: Cell<bool>,
    ttl: usize,
}

/// Headless reactive scope (cheap to clone, clones share state)
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_DIGEST_TTL)
    }

    /// Create a scope with a custom digest pass limit
    pub fn with_ttl(ttl: usize) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                properties: RefCell::new(FxHashMap::default()),
                watchers: RefCell::new(SlotMap::with_key()),
                listeners: RefCell::new(SlotMap::with_key()),
                digest_hooks: RefCell::new(SlotMap::with_key()),
                digesting: Cell::new(false),
                destroyed: Cell::new(false),
                ttl: ttl.max(1),
            }),
        }
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    pub fn get(&self, name: &str) -> Value {
        self.inner
            .properties
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&self, name: &str, value: Value) {
        let mut properties = self.inner.properties.borrow_mut();
        if value.is_undefined() {
            properties.remove(name);
        } else {
            properties.insert(name.to_string(), value);
        }
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.inner.properties.borrow_mut().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.properties.borrow().contains_key(name)
    }

    // =========================================================================
    // REGISTRATIONS
    // =========================================================================

    pub fn watch(&self, expr: WatchExpr, listener: WatchListener) -> Subscription {
        if self.inner.destroyed.get() {
            tracing::warn!(?expr, "watch installed on a destroyed scope (ignored)");
            return Subscription::noop();
        }
        let id = self.inner.watchers.borrow_mut().insert(WatchNode {
            expr,
            last: None,
            listener: Some(listener),
        });
        let weak: Weak<ScopeInner> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.watchers.borrow_mut().remove(id);
            }
        })
    }

    pub fn on(&self, event: &str, listener: EventListener) -> Subscription {
        if self.inner.destroyed.get() {
            return Subscription::noop();
        }
        let id = self
            .inner
            .listeners
            .borrow_mut()
            .insert((event.to_string(), listener));
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().remove(id);
            }
        })
    }

    pub fn on_digest(&self, hook: DigestHook) -> Subscription {
        if self.inner.destroyed.get() {
            return Subscription::noop();
        }
        let id = self.inner.digest_hooks.borrow_mut().insert(hook);
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.digest_hooks.borrow_mut().remove(id);
            }
        })
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len() + self.inner.digest_hooks.borrow().len()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Deliver an event to every listener registered for `name`
    ///
    /// Returns the number of listeners invoked.
    pub fn broadcast(&self, name: &str, payload: Value) -> usize {
        let targets: Vec<(ListenerId, EventListener)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, (event, _))| event == name)
            .map(|(id, (_, listener))| (id, listener.clone()))
            .collect();

        let event = ScopeEvent {
            name: name.to_string(),
            payload,
        };
        let mut delivered = 0;
        for (id, listener) in targets {
            // An earlier listener may have released this one
            if !self.inner.listeners.borrow().contains_key(id) {
                continue;
            }
            listener(&event);
            delivered += 1;
        }
        delivered
    }

    /// Tear the scope down
    ///
    /// Broadcasts [`DESTROY_EVENT`] first so owners can release their
    /// registrations, then drops whatever is left.
    pub fn destroy(&self) {
        if self.inner.destroyed.get() {
            return;
        }
        self.broadcast(DESTROY_EVENT, Value::Undefined);
        self.inner.destroyed.set(true);

        let remaining = self.inner.watchers.borrow().len();
        if remaining > 0 {
            tracing::debug!(remaining, "dropping watches left on destroyed scope");
        }
        self.inner.watchers.borrow_mut().clear();
        self.inner.listeners.borrow_mut().clear();
        self.inner.digest_hooks.borrow_mut().clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    // =========================================================================
    // DIGEST
    // =========================================================================

    /// Run change detection until the scope settles, then the digest hooks
    ///
    /// Returns the number of passes it took.
    pub fn digest(&self) -> Result<usize> {
        if self.inner.destroyed.get() {
            return Err(ScopeError::Destroyed);
        }
        if self.inner.digesting.replace(true) {
            return Err(ScopeError::DigestInProgress);
        }
        let settled = self.settle();
        self.inner.digesting.set(false);

        let passes = match settled {
            Ok(passes) => passes,
            Err(err) => {
                tracing::warn!(%err, "digest aborted");
                return Err(err);
            }
        };
        tracing::trace!(passes, "digest settled");

        let hooks: Vec<(DigestHookId, DigestHook)> = self
            .inner
            .digest_hooks
            .borrow()
            .iter()
            .map(|(id, hook)| (id, hook.clone()))
            .collect();
        for (id, hook) in hooks {
            if !self.inner.digest_hooks.borrow().contains_key(id) {
                continue;
            }
            hook();
        }
        Ok(passes)
    }

    fn settle(&self) -> Result<usize> {
        let mut passes = 0;
        loop {
            passes += 1;
            let mut dirty = false;

            let ids: Vec<WatchId> = self.inner.watchers.borrow().keys().collect();
            for id in ids {
                let expr = match self.inner.watchers.borrow().get(id) {
                    Some(node) => node.expr.clone(),
                    None => continue,
                };
                // No borrow is held while user code runs
                let current = expr.evaluate(self);

                let old = {
                    let mut watchers = self.inner.watchers.borrow_mut();
                    let Some(node) = watchers.get_mut(id) else {
                        continue;
                    };
                    match node.last.as_mut() {
                        Some(last) if last.same(&current) => continue,
                        Some(last) => std::mem::replace(last, current.clone()),
                        None => {
                            node.last = Some(current.clone());
                            current.clone()
                        }
                    }
                };
                dirty = true;

                let listener = self
                    .inner
                    .watchers
                    .borrow_mut()
                    .get_mut(id)
                    .and_then(|node| node.listener.take());
                if let Some(mut listener) = listener {
                    listener(&current, &old);
                    if let Some(node) = self.inner.watchers.borrow_mut().get_mut(id) {
                        node.listener = Some(listener);
                    }
                }
            }

            if !dirty {
                return Ok(passes);
            }
            if passes >= self.inner.ttl {
                return Err(ScopeError::InfiniteDigest {
                    ttl: self.inner.ttl,
                });
            }
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("properties", &self.inner.properties.borrow().len())
            .field("watchers", &self.watcher_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ReactiveScope for Scope {
    fn get(&self, name: &str) -> Value {
        Scope::get(self, name)
    }

    fn set(&self, name: &str, value: Value) {
        Scope::set(self, name, value)
    }

    fn watch(&self, expr: WatchExpr, listener: WatchListener) -> Subscription {
        Scope::watch(self, expr, listener)
    }

    fn on(&self, event: &str, listener: EventListener) -> Subscription {
        Scope::on(self, event, listener)
    }

    fn on_digest(&self, hook: DigestHook) -> Subscription {
        Scope::on_digest(self, hook)
    }
}
