//! Screen Fade Demo
//!
//! A screen slides and fades between two named states. A small custom
//! suite sits on top of the default one and reports every fire; the
//! default suite still writes the styles.
//!
//! Features demonstrated:
//! - Bindings loaded from TOML configuration
//! - Named states with fire parameters
//! - A custom suite with an injected dependency
//! - halt/resume
//!
//! Run with: cargo run -p fl_transition --example screen_fade

use anyhow::Result;
use fl_core::{Element, Injector, RecordingElement, Scope, Value};
use fl_transition::{
    Changes, FireParams, FnSuite, InjectedFactory, SuiteContext, TransitionConfig,
    TransitionService,
};
use std::rc::Rc;

const CONFIG: &str = r#"
default_display = "block"

[bindings]
x = "css-x"
opacity = "css-opacity"
hidden = "css-hidden"

[states.offscreen]
values = { x = -320, opacity = 0, hidden = true }

[states.onscreen]
values = { x = 0, opacity = 1, hidden = false }
params = { duration = 250 }
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut injector = Injector::new();
    injector.provide("frameRate", Rc::new(60u32));
    let service =
        TransitionService::with_config(injector, TransitionConfig::from_toml_str(CONFIG)?);

    let scope = Scope::new();
    let element = Rc::new(RecordingElement::new());
    let transition = service.create(Rc::new(scope.clone()), element.clone())?;

    let reporter = InjectedFactory::new("reporter", &["frameRate"], |ctx: &mut SuiteContext| {
        let frame_rate = ctx.dependency::<u32>("frameRate")?;
        Ok(FnSuite::new("reporter")
            .on_fire(move |element: &dyn Element, params: Option<&FireParams>| {
                let duration = params
                    .and_then(|params| params.get("duration"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let frames = (duration / 1000.0 * f64::from(*frame_rate)).ceil();
                println!(
                    "fire: left={} opacity={} display={} ({} frames)",
                    element.css("left"),
                    element.css("opacity"),
                    element.css("display"),
                    frames
                );
                if let Some(params) = params {
                    params.complete();
                }
            })
            .boxed())
    });
    transition.add_suite(&reporter)?;

    transition.state("offscreen")?;
    scope.digest()?;

    let done = FireParams::new()
        .with("duration", 250)
        .on_complete(|| println!("screen shown"));
    transition.state("onscreen")?;
    transition.apply(Changes::new().set("x", 0), Some(done))?;
    scope.digest()?;

    // Nothing is written while halted; the change lands after resume
    transition.halt();
    scope.set("opacity", Value::from(0.5));
    scope.digest()?;
    println!("style batches while halted: {}", element.batch_count());
    transition.resume();
    scope.digest()?;

    println!("final style: {:?}", element.current_style());
    scope.destroy();
    println!("disposed: {}", transition.is_disposed());
    Ok(())
}
