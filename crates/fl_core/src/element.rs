//! Styleable element handles
//!
//! The transition engine never touches a real render tree. It reads and
//! writes inline styles through [`Element`], which a host implements over
//! whatever it draws with. [`RecordingElement`] is a headless
//! implementation that keeps the current style and records every batch
//! written to it, useful for tests and server-side layout.

use indexmap::IndexMap;
use std::cell::RefCell;

use crate::value::Value;

/// Ordered batch of style properties
pub type StyleMap = IndexMap<String, Value>;

/// A handle to something with inline styles
pub trait Element {
    /// Read one style property, `Undefined` when unset
    fn css(&self, name: &str) -> Value;

    /// Apply a batch of style properties in a single write
    fn set_css(&self, styles: &StyleMap);
}

/// Headless element that records style writes
#[derive(Debug, Default)]
pub struct RecordingElement {
    styles: RefCell<StyleMap>,
    batches: RefCell<Vec<StyleMap>>,
}

impl RecordingElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an initial inline style (not recorded as a batch)
    pub fn with_style(styles: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            styles: RefCell::new(styles.into_iter().collect()),
            batches: RefCell::new(Vec::new()),
        }
    }

    /// Every batch passed to [`Element::set_css`], oldest first
    pub fn batches(&self) -> Vec<StyleMap> {
        self.batches.borrow().clone()
    }

    /// Take the recorded batches
    pub fn take_batches(&self) -> Vec<StyleMap> {
        std::mem::take(&mut *self.batches.borrow_mut())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.borrow().len()
    }

    /// Current value of every style property written so far
    pub fn current_style(&self) -> StyleMap {
        self.styles.borrow().clone()
    }
}

impl Element for RecordingElement {
    fn css(&self, name: &str) -> Value {
        self.styles.borrow().get(name).cloned().unwrap_or_default()
    }

    fn set_css(&self, styles: &StyleMap) {
        {
            let mut current = self.styles.borrow_mut();
            for (name, value) in styles {
                current.insert(name.clone(), value.clone());
            }
        }
        self.batches.borrow_mut().push(styles.clone());
    }
}
