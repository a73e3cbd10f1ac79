//! Named dependency injection
//!
//! Transition suites declare the services they need by name; the engine
//! resolves those names against an [`Injector`] and hands the suite a
//! [`Dependencies`] bundle. Services are stored type-erased and downcast
//! on retrieval.
//!
//! ```rust
//! use fl_core::inject::Injector;
//! use std::rc::Rc;
//!
//! let mut injector = Injector::new();
//! injector.provide("frameRate", Rc::new(60u32));
//!
//! let deps = injector.resolve(&["frameRate"]).unwrap();
//! assert_eq!(*deps.get::<u32>("frameRate").unwrap(), 60);
//! ```

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InjectError {
    /// Nothing was provided under this name
    #[error("Unknown dependency '{name}'")]
    Unknown { name: String },

    /// A service exists but has a different type
    #[error("Dependency '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Result type for injection
pub type Result<T> = std::result::Result<T, InjectError>;

type Service = Rc<dyn Any>;

fn downcast<T: Any>(name: &str, service: &Service) -> Result<Rc<T>> {
    service
        .clone()
        .downcast::<T>()
        .map_err(|_| InjectError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// Registry of named services
#[derive(Clone, Default)]
pub struct Injector {
    services: FxHashMap<String, Service>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a service
    pub fn provide<T: Any>(&mut self, name: impl Into<String>, service: Rc<T>) -> &mut Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Fetch a single service
    pub fn get<T: Any>(&self, name: &str) -> Result<Rc<T>> {
        let service = self.services.get(name).ok_or_else(|| InjectError::Unknown {
            name: name.to_string(),
        })?;
        downcast(name, service)
    }

    /// Resolve a list of declared dependency names into a bundle
    ///
    /// Fails on the first unknown name.
    pub fn resolve(&self, names: &[&str]) -> Result<Dependencies> {
        let mut resolved = IndexMap::with_capacity(names.len());
        for name in names {
            let service = self.services.get(*name).ok_or_else(|| InjectError::Unknown {
                name: name.to_string(),
            })?;
            resolved.insert(name.to_string(), service.clone());
        }
        Ok(Dependencies { resolved })
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        f.debug_struct("Injector").field("services", &names).finish()
    }
}

/// Services resolved for one construction, in declaration order
#[derive(Clone, Default)]
pub struct Dependencies {
    resolved: IndexMap<String, Service>,
}

impl Dependencies {
    pub fn get<T: Any>(&self, name: &str) -> Result<Rc<T>> {
        let service = self.resolved.get(name).ok_or_else(|| InjectError::Unknown {
            name: name.to_string(),
        })?;
        downcast(name, service)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolved.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.resolved.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_in_declaration_order() {
        let mut injector = Injector::new();
        injector
            .provide("easing", Rc::new("linear".to_string()))
            .provide("duration", Rc::new(250u64));

        let deps = injector.resolve(&["duration", "easing"]).unwrap();
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["duration", "easing"]);
        assert_eq!(*deps.get::<u64>("duration").unwrap(), 250);
        assert_eq!(deps.get::<String>("easing").unwrap().as_str(), "linear");
    }

    #[test]
    fn test_unknown_dependency() {
        let injector = Injector::new();
        let err = injector.resolve(&["missing"]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown dependency 'missing'");
    }

    #[test]
    fn test_type_mismatch() {
        let mut injector = Injector::new();
        injector.provide("duration", Rc::new(250u64));
        let err = injector.get::<String>("duration").unwrap_err();
        assert!(matches!(err, InjectError::TypeMismatch { .. }));
    }
}
