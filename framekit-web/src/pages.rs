//! Entry points for the SDK-hosted pages: the dispatch frame and the
//! redirect and cancel landing pages opened inside the popup.
//!
//! Each returns a handle that keeps the page's message listener alive;
//! pages keep it for their whole lifetime.

use crate::browser::{BrowserDispatchContext, BrowserPopupContext, MessageListener, WebScheduler};
use crate::utils;
use framekit_lib::bus::{BusEndpoint, MessageBus};
use framekit_lib::dispatch::{run_dispatch_frame, DispatchOutcome};
use framekit_lib::scripts::{FrameScripts, ScriptOutcome};
use framekit_lib::Timings;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::Window;

/// A running dispatch frame.
#[wasm_bindgen]
pub struct DispatchFramePage {
    _listener: MessageListener,
    _bus: Option<Rc<MessageBus>>,
}

/// A running redirect or cancel page.
#[wasm_bindgen]
pub struct LandingPage {
    _listener: MessageListener,
    outcome: ScriptOutcome,
}

#[wasm_bindgen]
impl LandingPage {
    /// Whether the result reached the dispatch frame.
    #[wasm_bindgen(getter)]
    pub fn reported(&self) -> bool {
        self.outcome == ScriptOutcome::Reported
    }
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| utils::js_error("No window object"))
}

/// Run inside the dispatch frame: announce readiness and relay reports.
#[wasm_bindgen(js_name = runDispatchFrame)]
pub fn run_dispatch_frame_page() -> Result<DispatchFramePage, JsValue> {
    let window = window()?;
    let endpoint = BusEndpoint::new();
    let listener = MessageListener::install(&window, endpoint.clone())?;

    let ctx = BrowserDispatchContext::new(window);
    let (outcome, bus) = run_dispatch_frame(&ctx, endpoint);
    if outcome != DispatchOutcome::Relaying {
        utils::warn(&format!("framekit: dispatch frame inactive: {:?}", outcome));
    }
    Ok(DispatchFramePage {
        _listener: listener,
        _bus: bus,
    })
}

/// Run on the redirect landing page: report the query string and close.
#[wasm_bindgen(js_name = runRedirectFrame)]
pub fn run_redirect_frame() -> Result<LandingPage, JsValue> {
    run_landing(|scripts| scripts.run_redirect())
}

/// Run on the cancel landing page: report cancellation and close.
#[wasm_bindgen(js_name = runCancelFrame)]
pub fn run_cancel_frame() -> Result<LandingPage, JsValue> {
    run_landing(|scripts| scripts.run_cancel())
}

fn run_landing(run: impl FnOnce(&FrameScripts) -> ScriptOutcome) -> Result<LandingPage, JsValue> {
    let window = window()?;
    // Acknowledgements come from the dispatch frame, which shares this
    // page's origin.
    let origin = window.location().origin()?;
    let endpoint = BusEndpoint::with_allowed_origin(origin);
    let listener = MessageListener::install(&window, endpoint.clone())?;

    let scripts = FrameScripts::new(
        Rc::new(BrowserPopupContext::new(window.clone())),
        Rc::new(WebScheduler::new(window)),
        endpoint,
        Timings::default(),
    );
    let outcome = run(&scripts);
    if outcome != ScriptOutcome::Reported {
        utils::warn(&format!("framekit: result not reported: {:?}", outcome));
    }
    Ok(LandingPage {
        _listener: listener,
        outcome,
    })
}
