//! fl Core
//!
//! The collaborators a transition engine runs against:
//!
//! - **Values**: dynamically typed scope properties and style values
//! - **Scopes**: reactive data contexts with watches, events and a
//!   dirty-checking digest cycle
//! - **Elements**: handles with batched inline-style writes
//! - **Injection**: named services resolved for suite construction
//!
//! # Example
//!
//! ```rust
//! use fl_core::{Scope, Value};
//!
//! let scope = Scope::new();
//! scope.set("opacity", Value::from(0.5));
//! assert_eq!(scope.get("opacity"), Value::Number(0.5));
//! assert!(scope.get("missing").is_undefined());
//! ```

pub mod element;
pub mod inject;
pub mod scope;
pub mod subscription;
pub mod value;

pub use element::{Element, RecordingElement, StyleMap};
pub use inject::{Dependencies, InjectError, Injector};
pub use scope::{
    DigestHook, EventListener, ReactiveScope, Scope, ScopeError, ScopeEvent, WatchExpr,
    WatchListener, DESTROY_EVENT,
};
pub use subscription::Subscription;
pub use value::{map_from_json, Value, ValueMap};
