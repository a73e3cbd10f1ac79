//! Built-in geometry, opacity and visibility handling
//!
//! The default suite is added before anything else, so it sits at the
//! bottom of precedence and any later suite can take over one of its
//! properties. Its handlers never touch the element directly: they stage
//! style entries and the suite writes them in one `set_css` call when the
//! cycle commits.
//!
//! | transition property | style written                                 |
//! |---------------------|-----------------------------------------------|
//! | `css-x`             | `left`                                        |
//! | `css-y`             | `top`                                         |
//! | `css-width`         | `width`                                       |
//! | `css-height`        | `height`                                      |
//! | `css-opacity`       | `opacity`, `-moz-opacity`, `filter`           |
//! | `css-hidden`        | `display` (`none`, or the display to restore) |
//!
//! Numeric lengths get a `px` suffix; strings such as percentages pass
//! through untouched.

use fl_core::{Element, StyleMap, Value};
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::params::FireParams;
use crate::suite::{SuiteContext, SuiteFactory, TransitionSuite};

pub const CSS_X: &str = "css-x";
pub const CSS_Y: &str = "css-y";
pub const CSS_WIDTH: &str = "css-width";
pub const CSS_HEIGHT: &str = "css-height";
pub const CSS_OPACITY: &str = "css-opacity";
pub const CSS_HIDDEN: &str = "css-hidden";

/// Display restored when an element is shown and nothing was recorded
pub const DEFAULT_DISPLAY: &str = "block";

/// Style entries staged during one cycle
#[derive(Debug, Default)]
struct StyleBatch {
    styles: StyleMap,
    /// Requested visibility, resolved against the element on commit
    hidden: Option<bool>,
}

impl StyleBatch {
    fn is_empty(&self) -> bool {
        self.styles.is_empty() && self.hidden.is_none()
    }
}

type SharedBatch = Rc<RefCell<StyleBatch>>;

fn stage_length(batch: &SharedBatch, style: &'static str, value: &Value) {
    if value.is_undefined() {
        return;
    }
    batch
        .borrow_mut()
        .styles
        .insert(style.to_string(), value.to_css_length());
}

fn stage_opacity(batch: &SharedBatch, value: &Value) {
    let opacity = match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(opacity) = opacity else {
        if !value.is_undefined() {
            tracing::warn!(%value, "ignoring non-numeric opacity");
        }
        return;
    };

    let alpha = Value::from(opacity * 100.0);
    let styles = &mut batch.borrow_mut().styles;
    styles.insert("opacity".into(), Value::from(opacity));
    styles.insert("-moz-opacity".into(), Value::from(opacity));
    styles.insert("filter".into(), Value::String(format!("alpha(opacity={})", alpha)));
}

/// The built-in suite
pub struct DefaultSuite {
    batch: SharedBatch,
    default_display: String,
    /// Display the element had before this suite hid it
    restore_display: Option<String>,
}

impl DefaultSuite {
    /// Factory registering the built-in handlers
    pub fn factory(default_display: impl Into<String>) -> DefaultSuiteFactory {
        DefaultSuiteFactory {
            default_display: default_display.into(),
        }
    }

    fn register(ctx: &mut SuiteContext, default_display: String) -> Result<Self> {
        let batch = SharedBatch::default();

        for (property, style) in [
            (CSS_X, "left"),
            (CSS_Y, "top"),
            (CSS_WIDTH, "width"),
            (CSS_HEIGHT, "height"),
        ] {
            let staged = batch.clone();
            ctx.register(property, move |new: &Value, _: &Value| {
                stage_length(&staged, style, new)
            })?;
        }

        let staged = batch.clone();
        ctx.register(CSS_OPACITY, move |new: &Value, _: &Value| {
            stage_opacity(&staged, new)
        })?;

        let staged = batch.clone();
        ctx.register(CSS_HIDDEN, move |new: &Value, _: &Value| {
            staged.borrow_mut().hidden = Some(new.is_truthy());
        })?;

        Ok(Self {
            batch,
            default_display,
            restore_display: None,
        })
    }

    fn resolve_display(&mut self, element: &dyn Element, hidden: bool, styles: &mut StyleMap) {
        let current = element.css("display");
        let current = current.as_str().filter(|display| !display.is_empty());

        if hidden {
            if let Some(display) = current.filter(|display| *display != "none") {
                self.restore_display = Some(display.to_string());
            }
            styles.insert("display".into(), Value::from("none"));
            return;
        }

        // Only shown elements that are actually hidden
        if current != Some("none") && self.restore_display.is_none() {
            return;
        }
        let display = self
            .restore_display
            .take()
            .unwrap_or_else(|| self.default_display.clone());
        styles.insert("display".into(), Value::String(display));
    }
}

impl TransitionSuite for DefaultSuite {
    fn name(&self) -> &str {
        "default"
    }

    fn commit(&mut self, element: &dyn Element, params: Option<&FireParams>) {
        let StyleBatch { mut styles, hidden } = std::mem::take(&mut *self.batch.borrow_mut());
        if let Some(hidden) = hidden {
            self.resolve_display(element, hidden, &mut styles);
        }
        if styles.is_empty() {
            return;
        }

        tracing::trace!(styles = styles.len(), "default suite style batch");
        element.set_css(&styles);
        if let Some(params) = params {
            params.complete();
        }
    }

    fn fire(&mut self, _element: &dyn Element, params: Option<&FireParams>) {
        if let Some(params) = params {
            params.complete();
        }
    }

    fn dispose(&mut self) {
        let batch = self.batch.borrow();
        if !batch.is_empty() {
            tracing::debug!("dropping uncommitted default suite batch");
        }
    }
}

/// Builds a [`DefaultSuite`]
#[derive(Clone, Debug)]
pub struct DefaultSuiteFactory {
    default_display: String,
}

impl Default for DefaultSuiteFactory {
    fn default() -> Self {
        DefaultSuite::factory(DEFAULT_DISPLAY)
    }
}

impl SuiteFactory for DefaultSuiteFactory {
    fn name(&self) -> &str {
        "default"
    }

    fn create(&self, ctx: &mut SuiteContext) -> Result<Box<dyn TransitionSuite>> {
        Ok(Box::new(DefaultSuite::register(ctx, self.default_display.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::SuiteRegistry;
    use fl_core::{Injector, RecordingElement};
    use std::cell::Cell;

    fn registry(default_display: &str) -> SuiteRegistry {
        let mut registry = SuiteRegistry::new();
        registry
            .add(&DefaultSuite::factory(default_display), &Injector::new())
            .unwrap();
        registry
    }

    fn style(pairs: &[(&str, Value)]) -> StyleMap {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_geometry_and_opacity_in_one_batch() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::new();
        let none = Value::Undefined;

        registry.handle(CSS_X, &Value::from(1), &none);
        registry.handle(CSS_Y, &Value::from(2), &none);
        registry.handle(CSS_WIDTH, &Value::from("100%"), &none);
        registry.handle(CSS_HEIGHT, &Value::from(200), &none);
        registry.handle(CSS_OPACITY, &Value::from(0.5), &none);
        registry.commit_all(&element, None);

        assert_eq!(
            element.batches(),
            vec![style(&[
                ("left", "1px".into()),
                ("top", "2px".into()),
                ("width", "100%".into()),
                ("height", "200px".into()),
                ("opacity", 0.5.into()),
                ("-moz-opacity", 0.5.into()),
                ("filter", "alpha(opacity=50)".into()),
            ])]
        );
    }

    #[test]
    fn test_empty_cycle_writes_nothing() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::new();
        registry.handle(CSS_X, &Value::Undefined, &Value::Undefined);
        registry.commit_all(&element, None);
        assert_eq!(element.batch_count(), 0);
    }

    #[test]
    fn test_opacity_accepts_numeric_strings() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::new();
        registry.handle(CSS_OPACITY, &Value::from(" 0.25"), &Value::Undefined);
        registry.commit_all(&element, None);

        assert_eq!(element.css("opacity"), Value::from(0.25));
        assert_eq!(element.css("filter"), Value::from("alpha(opacity=25)"));
    }

    #[test]
    fn test_opacity_filter_keeps_fractional_percent() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::new();
        registry.handle(CSS_OPACITY, &Value::from(0.125), &Value::Undefined);
        registry.commit_all(&element, None);

        assert_eq!(element.css("filter"), Value::from("alpha(opacity=12.5)"));
    }

    #[test]
    fn test_hide_then_restore_recorded_display() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::with_style([("display".to_string(), "inline".into())]);

        registry.handle(CSS_HIDDEN, &Value::from(true), &Value::from(true));
        registry.commit_all(&element, None);
        registry.handle(CSS_HIDDEN, &Value::from(false), &Value::from(true));
        registry.commit_all(&element, None);

        assert_eq!(
            element.batches(),
            vec![
                style(&[("display", "none".into())]),
                style(&[("display", "inline".into())]),
            ]
        );
    }

    #[test]
    fn test_show_falls_back_to_default_display() {
        let mut registry = registry("flex");
        let element = RecordingElement::with_style([("display".to_string(), "none".into())]);

        registry.handle(CSS_HIDDEN, &Value::from(false), &Value::from(false));
        registry.commit_all(&element, None);
        assert_eq!(element.css("display"), Value::from("flex"));
    }

    #[test]
    fn test_visible_element_is_left_alone() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::new();
        registry.handle(CSS_HIDDEN, &Value::from(false), &Value::from(false));
        registry.commit_all(&element, None);
        assert_eq!(element.batch_count(), 0);
    }

    #[test]
    fn test_commit_completes_params() {
        let mut registry = registry(DEFAULT_DISPLAY);
        let element = RecordingElement::new();
        let completed = Rc::new(Cell::new(0));
        let counter = completed.clone();
        let params = FireParams::new()
            .on_complete(move || counter.set(counter.get() + 1))
            .for_cycle();

        registry.handle(CSS_X, &Value::from("value"), &Value::Undefined);
        registry.commit_all(&element, Some(&params));
        registry.fire(&element, Some(&params));
        assert_eq!(completed.get(), 1);
    }
}
