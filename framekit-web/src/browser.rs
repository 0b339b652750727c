//! Browser implementations of the framekit platform traits.
//!
//! Everything here is a thin adapter over `web-sys`; protocol decisions
//! stay in `framekit-lib`.

use crate::utils;
use framekit_lib::bus::{BusEndpoint, BusTransport};
use framekit_lib::dispatch::DispatchContext;
use framekit_lib::errors::BusError;
use framekit_lib::platform::{FrameHost, FrameNodeId, FrameSpec, Scheduler, TimerId};
use framekit_lib::popup::{HostGeometry, NativeBridge, NativeCompletion, PopupWindow, WindowOpener};
use framekit_lib::scripts::PopupContext;
use js_sys::{Function, Reflect};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlIFrameElement, MessageEvent, Window};

// ============================================================
// Transport
// ============================================================

/// `postMessage` to another window.
pub struct WindowTransport {
    target: Window,
    target_origin: String,
}

impl WindowTransport {
    pub fn new(target: Window, target_origin: impl Into<String>) -> Self {
        Self {
            target,
            target_origin: target_origin.into(),
        }
    }
}

impl BusTransport for WindowTransport {
    fn post(&self, message: &str) -> Result<(), BusError> {
        self.target
            .post_message(&JsValue::from_str(message), &self.target_origin)
            .map_err(|e| BusError::Transport(format!("postMessage failed: {:?}", e)))
    }
}

/// Feeds a window's `message` events into a [`BusEndpoint`].
///
/// The listener is removed when this value is dropped.
pub struct MessageListener {
    window: Window,
    callback: Closure<dyn FnMut(MessageEvent)>,
}

impl MessageListener {
    pub fn install(window: &Window, endpoint: Rc<BusEndpoint>) -> Result<Self, JsValue> {
        let callback = Closure::wrap(Box::new(move |event: MessageEvent| {
            let Some(raw) = event.data().as_string() else {
                return;
            };
            let origin = event.origin();
            // Cross-origin WindowProxies fail `instanceof Window`, so the
            // source cannot be checked-cast.
            let source = event.source().map(|source| {
                Rc::new(WindowTransport::new(source.unchecked_into::<Window>(), origin.clone()))
                    as Rc<dyn BusTransport>
            });
            if let Err(e) = endpoint.receive(&raw, &origin, source) {
                utils::warn(&format!("framekit: dropped bus message: {}", e));
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        window.add_event_listener_with_callback("message", callback.as_ref().unchecked_ref())?;
        Ok(Self {
            window: window.clone(),
            callback,
        })
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("message", self.callback.as_ref().unchecked_ref());
    }
}

// ============================================================
// Timers
// ============================================================

/// `setTimeout` / `setInterval` on a window.
///
/// Browsers share one handle space between timeouts and intervals, so a
/// [`TimerId`] is the raw handle and `clear` works for both. Every pending
/// callback stays in `timers` until it fires once (timeouts) or is cleared.
pub struct WebScheduler {
    window: Window,
    timers: Rc<RefCell<HashMap<i32, Closure<dyn FnMut()>>>>,
}

impl WebScheduler {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            timers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Number of callbacks still held for pending timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

fn millis(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

impl Scheduler for WebScheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let handle_slot = Rc::new(Cell::new(None::<i32>));
        let slot = handle_slot.clone();
        let timers = Rc::downgrade(&self.timers);
        let mut callback = Some(callback);
        let handler = Closure::wrap(Box::new(move || {
            // wasm-bindgen defers freeing a closure that is still running.
            let finished = match (timers.upgrade(), slot.get()) {
                (Some(timers), Some(handle)) => timers.borrow_mut().remove(&handle),
                _ => None,
            };
            if let Some(callback) = callback.take() {
                callback();
            }
            drop(finished);
        }) as Box<dyn FnMut()>);

        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                handler.as_ref().unchecked_ref(),
                millis(delay),
            ) {
            Ok(handle) => {
                handle_slot.set(Some(handle));
                self.timers.borrow_mut().insert(handle, handler);
                TimerId(handle as u64)
            }
            Err(e) => {
                utils::error(&format!("framekit: setTimeout failed: {:?}", e));
                TimerId(0)
            }
        }
    }

    fn set_interval(&self, period: Duration, mut callback: Box<dyn FnMut()>) -> TimerId {
        let handler = Closure::wrap(Box::new(move || callback()) as Box<dyn FnMut()>);
        match self.window.set_interval_with_callback_and_timeout_and_arguments_0(
            handler.as_ref().unchecked_ref(),
            millis(period),
        ) {
            Ok(handle) => {
                self.timers.borrow_mut().insert(handle, handler);
                TimerId(handle as u64)
            }
            Err(e) => {
                utils::error(&format!("framekit: setInterval failed: {:?}", e));
                TimerId(0)
            }
        }
    }

    fn clear(&self, id: TimerId) {
        let handle = id.0 as i32;
        self.window.clear_timeout_with_handle(handle);
        // Dropped outside the borrow; wasm-bindgen defers freeing a closure
        // that is still running.
        let handler = self.timers.borrow_mut().remove(&handle);
        drop(handler);
    }
}

// ============================================================
// Host document
// ============================================================

/// Appends hidden iframes to the host document body.
pub struct DocumentFrameHost {
    document: Document,
    next_id: Cell<u64>,
    frames: RefCell<HashMap<u64, (HtmlIFrameElement, String)>>,
}

impl DocumentFrameHost {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            next_id: Cell::new(1),
            frames: RefCell::new(HashMap::new()),
        }
    }

    fn create_frame(&self, spec: &FrameSpec) -> Result<HtmlIFrameElement, JsValue> {
        let frame: HtmlIFrameElement = self.document.create_element("iframe")?.dyn_into()?;
        frame.set_name(&spec.name);
        frame.set_src(&spec.src);
        frame.set_attribute("style", "display:none;position:absolute;width:0;height:0;border:0")?;
        frame.set_attribute("aria-hidden", "true")?;
        let body = self
            .document
            .body()
            .ok_or_else(|| utils::js_error("document has no body"))?;
        body.append_child(&frame)?;
        Ok(frame)
    }
}

impl FrameHost for DocumentFrameHost {
    fn append_frame(&self, spec: &FrameSpec) -> FrameNodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        match self.create_frame(spec) {
            Ok(frame) => {
                let origin = utils::origin_of(&spec.src).unwrap_or_else(|| "*".to_string());
                self.frames.borrow_mut().insert(id, (frame, origin));
            }
            Err(e) => utils::error(&format!("framekit: could not write dispatch frame: {:?}", e)),
        }
        FrameNodeId(id)
    }

    fn remove_frame(&self, node: FrameNodeId) {
        if let Some((frame, _)) = self.frames.borrow_mut().remove(&node.0) {
            frame.remove();
        }
    }

    fn locate_frame(&self, name: &str) -> Option<Rc<dyn BusTransport>> {
        let frames = self.frames.borrow();
        let (frame, origin) = frames.values().find(|(frame, _)| frame.name() == name)?;
        let window = frame.content_window()?;
        Some(Rc::new(WindowTransport::new(window, origin.clone())))
    }
}

// ============================================================
// Popups
// ============================================================

/// `window.open` on the host window.
pub struct BrowserWindowOpener {
    window: Window,
}

impl BrowserWindowOpener {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

fn number(value: Result<JsValue, JsValue>) -> Option<f64> {
    value.ok().and_then(|v| v.as_f64())
}

impl WindowOpener for BrowserWindowOpener {
    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>> {
        match self
            .window
            .open_with_url_and_target_and_features(url, name, features)
        {
            Ok(Some(popup)) => Some(Box::new(BrowserPopupWindow(popup))),
            Ok(None) => None,
            Err(e) => {
                utils::warn(&format!("framekit: window.open failed: {:?}", e));
                None
            }
        }
    }

    fn geometry(&self) -> HostGeometry {
        let root = self
            .window
            .document()
            .and_then(|document| document.document_element());
        HostGeometry {
            outer_width: number(self.window.outer_width()),
            outer_height: number(self.window.outer_height()),
            screen_x: number(self.window.screen_x()).unwrap_or_default(),
            screen_y: number(self.window.screen_y()).unwrap_or_default(),
            client_width: root.as_ref().map_or(0.0, |e| f64::from(e.client_width())),
            client_height: root.as_ref().map_or(0.0, |e| f64::from(e.client_height())),
        }
    }
}

pub struct BrowserPopupWindow(Window);

impl PopupWindow for BrowserPopupWindow {
    fn is_closed(&self) -> bool {
        self.0.closed().unwrap_or(true)
    }

    fn close(&self) {
        let _ = self.0.close();
    }

    fn focus(&self) {
        let _ = self.0.focus();
    }

    fn navigate(&self, url: &str) {
        if let Err(e) = self.0.location().set_href(url) {
            utils::warn(&format!("framekit: popup navigation failed: {:?}", e));
        }
    }
}

/// `window.popupBridge`, exposed by native apps hosting the page in a webview.
///
/// The bridge reports through its `onComplete(err, payload)` property and
/// presents pages with `open(url)`.
pub struct JsPopupBridge {
    bridge: JsValue,
    on_complete: RefCell<Option<Closure<dyn FnMut(JsValue, JsValue)>>>,
}

impl JsPopupBridge {
    /// The bridge of `window`, if the embedding app installed one.
    pub fn detect(window: &Window) -> Option<Self> {
        let bridge = Reflect::get(window, &JsValue::from_str("popupBridge")).ok()?;
        if !bridge.is_object() {
            return None;
        }
        Some(Self {
            bridge,
            on_complete: RefCell::new(None),
        })
    }

    fn call(&self, method: &str, args: &[JsValue]) -> Result<(), JsValue> {
        let function: Function = Reflect::get(&self.bridge, &JsValue::from_str(method))?.dyn_into()?;
        match args {
            [] => function.call0(&self.bridge)?,
            [arg] => function.call1(&self.bridge, arg)?,
            _ => return Err(utils::js_error("unsupported popupBridge call")),
        };
        Ok(())
    }

    fn has(&self, method: &str) -> bool {
        Reflect::get(&self.bridge, &JsValue::from_str(method))
            .map(|v| v.is_function())
            .unwrap_or(false)
    }
}

fn to_json(value: JsValue) -> Option<Value> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    serde_wasm_bindgen::from_value(value).ok()
}

impl NativeBridge for JsPopupBridge {
    fn open(&self, url: &str, on_complete: NativeCompletion) {
        let mut pending = Some(on_complete);
        let handler = Closure::wrap(Box::new(move |err: JsValue, payload: JsValue| {
            if let Some(on_complete) = pending.take() {
                on_complete(to_json(err), to_json(payload));
            }
        }) as Box<dyn FnMut(JsValue, JsValue)>);

        if let Err(e) = Reflect::set(
            &self.bridge,
            &JsValue::from_str("onComplete"),
            handler.as_ref(),
        ) {
            utils::error(&format!("framekit: could not set popupBridge.onComplete: {:?}", e));
        }
        // Replacing a previous handler drops it; wasm-bindgen keeps it
        // alive until any running invocation returns.
        let previous = self.on_complete.borrow_mut().replace(handler);
        drop(previous);

        if let Err(e) = self.call("open", &[JsValue::from_str(url)]) {
            utils::error(&format!("framekit: popupBridge.open failed: {:?}", e));
        }
    }

    fn close(&self) {
        if self.has("close") {
            let _ = self.call("close", &[]);
        }
    }

    fn focus(&self) {
        if self.has("focus") {
            let _ = self.call("focus", &[]);
        }
    }
}

// ============================================================
// SDK-hosted pages
// ============================================================

/// The popup window as seen by the redirect and cancel pages.
pub struct BrowserPopupContext {
    window: Window,
}

impl BrowserPopupContext {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl PopupContext for BrowserPopupContext {
    fn query(&self) -> String {
        self.window.location().search().unwrap_or_default()
    }

    fn window_name(&self) -> String {
        self.window.name().unwrap_or_default()
    }

    fn locate_dispatch_frame(&self, frame_name: &str) -> Option<Rc<dyn BusTransport>> {
        let opener = self.window.opener().ok().filter(|o| o.is_object())?;
        let opener: Window = opener.unchecked_into();
        let frames = opener.frames().ok()?;
        let frame = Reflect::get(&frames, &JsValue::from_str(frame_name))
            .ok()
            .filter(|f| f.is_object())?;
        // The dispatch frame is served from the same origin as this page.
        let origin = self.window.location().origin().ok()?;
        Some(Rc::new(WindowTransport::new(frame.unchecked_into(), origin)))
    }

    fn close_window(&self) {
        let _ = self.window.close();
    }
}

/// The dispatch frame as seen by its own page.
pub struct BrowserDispatchContext {
    window: Window,
}

impl BrowserDispatchContext {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// The embedding page's origin, from the referrer when one was sent.
    fn parent_origin(&self) -> String {
        self.window
            .document()
            .map(|document| document.referrer())
            .and_then(|referrer| utils::origin_of(&referrer))
            .unwrap_or_else(|| "*".to_string())
    }
}

impl DispatchContext for BrowserDispatchContext {
    fn frame_name(&self) -> String {
        self.window.name().unwrap_or_default()
    }

    fn parent(&self) -> Option<Rc<dyn BusTransport>> {
        let parent = self.window.parent().ok().flatten()?;
        Some(Rc::new(WindowTransport::new(parent, self.parent_origin())))
    }
}
