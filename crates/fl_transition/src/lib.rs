//! fl Transition
//!
//! Property transitions for layout elements. A layout element writes
//! plain values (`x`, `width`, `hidden`, ...) to its reactive scope; the
//! transition engine decides how those values reach the element.
//!
//! # Features
//!
//! - **Bindings**: map scope properties onto transition properties, one
//!   watch per scope property
//! - **Suites**: pluggable handler bundles; the last added suite wins per
//!   property and provides the `fire` step
//! - **Named states**: reusable presets that dispatch on every trigger
//! - **Halt/resume**: gate dispatch without losing changes
//! - **Default suite**: geometry, opacity and visibility written as one
//!   style batch per cycle
//!
//! # Example
//!
//! ```rust
//! use fl_core::{Element, Injector, RecordingElement, Scope, Value};
//! use fl_transition::{Changes, FireParams, TransitionService};
//! use std::rc::Rc;
//!
//! let service = TransitionService::new(Injector::new());
//! let scope = Scope::new();
//! let element = Rc::new(RecordingElement::new());
//! let transition = service.create(Rc::new(scope.clone()), element.clone()).unwrap();
//!
//! transition.bind("opacity", "css-opacity").unwrap();
//! transition.state_config("faded", Changes::new().set("opacity", 0.2), Some(FireParams::new()));
//! transition.state("faded").unwrap();
//! scope.digest().unwrap();
//!
//! assert_eq!(element.css("filter"), Value::from("alpha(opacity=20)"));
//! ```

pub mod apply;
pub mod binder;
pub mod config;
pub mod default_suite;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod params;
pub mod service;
pub mod state;
pub mod suite;

pub use apply::{Apply, Changes, PropertyValue};
pub use binder::PropertyBinder;
pub use config::{ConfigError, StateConfig, TransitionConfig};
pub use default_suite::{DefaultSuite, DefaultSuiteFactory};
pub use dispatch::{Cycle, DispatchController, PropertyChange};
pub use engine::TransitionEngine;
pub use error::{Result, TransitionError};
pub use params::{Callback, FireParams};
pub use service::TransitionService;
pub use state::{NamedState, StateMachine};
pub use suite::{
    FnSuite, Flow, Handler, InjectedFactory, SuiteContext, SuiteFactory, SuiteRegistry,
    TransitionSuite,
};
