//! Transition error types

use fl_core::InjectError;
use thiserror::Error;

/// Configuration errors raised by the transition engine
///
/// These are fatal to the call that raised them. A handler vetoing a cycle
/// is not an error, see [`crate::Flow`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    /// Scope-side name of a binding is empty or not a string
    #[error("Cannot bind scope property '{value}'")]
    InvalidScopeProperty { value: String },

    /// Transition-side name of a binding is empty or not a string
    #[error("Cannot bind transition property '{value}'")]
    InvalidTransitionProperty { value: String },

    /// A suite tried to register a reserved property name
    #[error("Cannot register transition property '{name}' it is reserved.")]
    ReservedProperty { name: String },

    /// A suite was built without a fire entrypoint
    #[error("Transition suite '{suite}' does not implement fire")]
    MissingFire { suite: String },

    /// A declared suite dependency could not be resolved
    #[error(transparent)]
    Dependency(#[from] InjectError),

    /// An expression binding reused a name that already has a watch
    #[error("Cannot bind expression '{name}', the scope property is already watched")]
    AlreadyWatched { name: String },

    /// `state` was called with a name that was never configured
    #[error("Unknown transition state '{name}'")]
    UnknownState { name: String },

    /// A suite was added while the engine was dispatching
    #[error("Cannot add transition suite '{suite}' while a cycle is dispatching")]
    Busy { suite: String },

    /// The engine was disposed
    #[error("Transition has been disposed")]
    Disposed,
}

/// Result type for transition operations
pub type Result<T> = std::result::Result<T, TransitionError>;
