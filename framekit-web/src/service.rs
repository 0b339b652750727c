//! `FrameService` for host pages.

use crate::browser::{
    BrowserWindowOpener, DocumentFrameHost, JsPopupBridge, MessageListener, WebScheduler,
};
use crate::utils;
use framekit_lib::bus::BusEndpoint;
use framekit_lib::popup::{NativeBridge, PopupEnvironment};
use framekit_lib::{
    CompletionResult, FrameConfiguration, FrameServiceOptions, OpenOptions, Platform, Timings,
};
use js_sys::Function;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// One popup-based authorization flow, driven from the host page.
///
/// ```js
/// const frames = new FrameService(
///   { name: "checkout", dispatchFrameUrl, openFrameUrl },
///   () => button.disabled = false,
/// );
/// frames.open((err, payload) => { ... });
/// ```
#[wasm_bindgen(js_name = FrameService)]
pub struct WasmFrameService {
    service: framekit_lib::FrameService,
    listener: RefCell<Option<MessageListener>>,
}

#[wasm_bindgen(js_class = FrameService)]
impl WasmFrameService {
    /// Validate `options`, write the dispatch frame and call `ready` once it
    /// has loaded. Invalid options throw.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue, ready: Option<Function>) -> Result<WasmFrameService, JsValue> {
        let options: FrameServiceOptions = serde_wasm_bindgen::from_value(options)
            .map_err(|e| utils::js_error(&format!("Invalid frame service options: {}", e)))?;
        let config = FrameConfiguration::try_from(options)
            .map_err(|e| utils::js_error(&e.to_string()))?;

        let window = web_sys::window().ok_or_else(|| utils::js_error("No window object"))?;
        let document = window
            .document()
            .ok_or_else(|| utils::js_error("No document object"))?;

        // Only the dispatch frame's origin may talk to the host.
        let dispatch_origin = utils::origin_of(config.dispatch_frame_url())
            .ok_or_else(|| utils::js_error("dispatchFrameUrl has no origin"))?;
        let endpoint = BusEndpoint::with_allowed_origin(dispatch_origin);
        let listener = MessageListener::install(&window, endpoint.clone())?;

        let bridge = JsPopupBridge::detect(&window).map(|b| Rc::new(b) as Rc<dyn NativeBridge>);
        let platform = Platform {
            scheduler: Rc::new(WebScheduler::new(window.clone())),
            frame_host: Rc::new(DocumentFrameHost::new(document)),
            popups: PopupEnvironment::detect(Rc::new(BrowserWindowOpener::new(window)), bridge),
            endpoint,
            timings: Timings::default(),
        };

        let service = framekit_lib::FrameService::new(config, platform);
        service.initialize(move || {
            if let Some(ready) = ready {
                if let Err(e) = ready.call0(&JsValue::NULL) {
                    utils::error(&format!("framekit: ready callback threw: {:?}", e));
                }
            }
        });

        Ok(Self {
            service,
            listener: RefCell::new(Some(listener)),
        })
    }

    /// The channel id shared by this service's frames and popups.
    #[wasm_bindgen(getter)]
    pub fn channel(&self) -> String {
        self.service.channel().to_string()
    }

    /// Open the configured `openFrameUrl`. `callback(err, payload)` runs once.
    pub fn open(&self, callback: Function) {
        self.service.open(completion(callback));
    }

    /// Open `url` instead of the configured `openFrameUrl`.
    #[wasm_bindgen(js_name = openUrl)]
    pub fn open_url(&self, url: String, callback: Function) {
        self.service
            .open_with(OpenOptions { url: Some(url) }, completion(callback));
    }

    pub fn redirect(&self, url: &str) {
        self.service.redirect(url);
    }

    pub fn focus(&self) {
        self.service.focus();
    }

    pub fn close(&self) {
        self.service.close();
    }

    #[wasm_bindgen(js_name = isFrameOpen)]
    pub fn is_frame_open(&self) -> bool {
        self.service.is_frame_open()
    }

    /// Remove the dispatch frame, close any popup and stop listening.
    pub fn teardown(&self, done: Option<Function>) {
        self.service.teardown(|| {});
        let listener = self.listener.borrow_mut().take();
        drop(listener);
        if let Some(done) = done {
            if let Err(e) = done.call0(&JsValue::NULL) {
                utils::error(&format!("framekit: teardown callback threw: {:?}", e));
            }
        }
    }
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

/// Adapt a node-style `(err, payload)` JS callback.
fn completion(callback: Function) -> impl FnOnce(CompletionResult) + 'static {
    move |result| {
        let (err, payload) = match result {
            Ok(payload) => (JsValue::NULL, to_js(&payload)),
            Err(err) => (to_js(&err.to_value()), JsValue::NULL),
        };
        if let Err(e) = callback.call2(&JsValue::NULL, &err, &payload) {
            utils::error(&format!("framekit: completion callback threw: {:?}", e));
        }
    }
}
