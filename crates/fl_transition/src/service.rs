//! Transition factory handed to the layout system

use fl_core::{Element, Injector, ReactiveScope};
use std::rc::Rc;

use crate::config::TransitionConfig;
use crate::engine::TransitionEngine;
use crate::error::Result;

/// Creates one [`TransitionEngine`] per (scope, element) pair
///
/// Every engine shares the service's injector and configuration.
#[derive(Debug, Clone, Default)]
pub struct TransitionService {
    injector: Injector,
    config: TransitionConfig,
}

impl TransitionService {
    pub fn new(injector: Injector) -> Self {
        Self::with_config(injector, TransitionConfig::default())
    }

    pub fn with_config(injector: Injector, config: TransitionConfig) -> Self {
        Self { injector, config }
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    pub fn create(
        &self,
        scope: Rc<dyn ReactiveScope>,
        element: Rc<dyn Element>,
    ) -> Result<TransitionEngine> {
        TransitionEngine::new(scope, element, self.injector.clone(), &self.config)
    }
}
