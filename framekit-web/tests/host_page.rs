//! Host page bindings running against a real browser DOM
//!
//! The dispatch frame URL points at nothing loadable, so these tests cover
//! everything up to the ready signal.

#![cfg(target_arch = "wasm32")]

use framekit_web::WasmFrameService;
use js_sys::{Function, Reflect, JSON};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn options(name: &str) -> JsValue {
    JSON::parse(&format!(
        r#"{{
            "name": "{}",
            "dispatchFrameUrl": "https://assets.framekit.test/dispatch.html",
            "openFrameUrl": "https://assets.framekit.test/landing.html"
        }}"#,
        name
    ))
    .unwrap()
}

fn dispatch_frame(channel: &str) -> Option<web_sys::Element> {
    web_sys::window()
        .unwrap()
        .document()
        .unwrap()
        .query_selector(&format!("iframe[name=\"dispatch_{}\"]", channel))
        .unwrap()
}

type Captured = Rc<RefCell<Vec<(JsValue, JsValue)>>>;

fn capture() -> (Function, Captured, Closure<dyn FnMut(JsValue, JsValue)>) {
    let calls: Captured = Rc::new(RefCell::new(Vec::new()));
    let c = calls.clone();
    let closure = Closure::wrap(Box::new(move |err: JsValue, payload: JsValue| {
        c.borrow_mut().push((err, payload));
    }) as Box<dyn FnMut(JsValue, JsValue)>);
    let function = closure.as_ref().unchecked_ref::<Function>().clone();
    (function, calls, closure)
}

// ===========================
// Construction
// ===========================

#[wasm_bindgen_test]
fn test_constructor_writes_hidden_dispatch_frame() {
    let service = WasmFrameService::new(options("checkout"), None).unwrap();

    let frame = dispatch_frame(&service.channel()).expect("dispatch frame in document");
    assert_eq!(
        frame.get_attribute("src").as_deref(),
        Some("https://assets.framekit.test/dispatch.html")
    );
    assert!(frame
        .get_attribute("style")
        .unwrap_or_default()
        .contains("display:none"));

    service.teardown(None);
}

#[wasm_bindgen_test]
fn test_constructor_rejects_invalid_name() {
    let result = WasmFrameService::new(options("check out"), None);
    assert!(result.is_err());
}

#[wasm_bindgen_test]
fn test_constructor_rejects_missing_urls() {
    let result = WasmFrameService::new(JSON::parse(r#"{ "name": "checkout" }"#).unwrap(), None);
    assert!(result.is_err());
}

// ===========================
// Lifecycle
// ===========================

#[wasm_bindgen_test]
fn test_open_before_ready_reports_open_failed() {
    let service = WasmFrameService::new(options("checkout"), None).unwrap();
    let (callback, calls, _closure) = capture();

    service.open(callback);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    let (err, payload) = &calls[0];
    assert!(payload.is_null());
    assert_eq!(
        Reflect::get(err, &JsValue::from_str("code"))
            .unwrap()
            .as_string()
            .as_deref(),
        Some("FRAME_SERVICE_FRAME_OPEN_FAILED")
    );
    assert!(!service.is_frame_open());
    drop(calls);
    service.teardown(None);
}

#[wasm_bindgen_test]
fn test_teardown_removes_frame_and_calls_done() {
    let service = WasmFrameService::new(options("checkout"), None).unwrap();
    let channel = service.channel();
    let (done, calls, _closure) = capture();

    service.teardown(Some(done.clone()));
    service.teardown(Some(done));

    assert!(dispatch_frame(&channel).is_none());
    assert_eq!(calls.borrow().len(), 2);
}

#[wasm_bindgen_test]
fn test_cleared_timers_release_their_callbacks() {
    use framekit_lib::platform::Scheduler;
    use framekit_web::WebScheduler;
    use std::time::Duration;

    let scheduler = WebScheduler::new(web_sys::window().unwrap());
    let timeout = scheduler.set_timeout(Duration::from_secs(60), Box::new(|| {}));
    let interval = scheduler.set_interval(Duration::from_secs(60), Box::new(|| {}));
    assert_eq!(scheduler.pending_timers(), 2);

    scheduler.clear(timeout);
    scheduler.clear(interval);
    assert_eq!(scheduler.pending_timers(), 0);
}
