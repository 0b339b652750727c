//! Pseudo-popup for embedded native app contexts.
//!
//! The embedding app exposes a bridge object that presents the third-party
//! page natively and calls back once with `(err, payload)`. Both an error
//! and an empty outcome count as the user dismissing the flow.

use super::{CompletionSink, PopupRequest};
use crate::errors::{FlowError, SdkError};
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;

/// Native completion: `(err, payload)` as reported by the bridge.
pub type NativeCompletion = Box<dyn FnOnce(Option<Value>, Option<Value>)>;

/// Host-provided bridge (`window.popupBridge` in app webviews).
pub trait NativeBridge {
    /// Present `url`. `on_complete` fires at most once per call.
    fn open(&self, url: &str, on_complete: NativeCompletion);

    /// Dismiss the native presentation, if the bridge supports it.
    fn close(&self) {}

    fn focus(&self) {}
}

pub struct BridgePopup {
    bridge: Rc<dyn NativeBridge>,
    closed: Rc<Cell<bool>>,
    sink: Option<CompletionSink>,
}

impl BridgePopup {
    pub fn new(bridge: Rc<dyn NativeBridge>) -> Self {
        Self {
            bridge,
            closed: Rc::new(Cell::new(true)),
            sink: None,
        }
    }

    pub fn initialize<F: FnOnce()>(&mut self, ready: F) {
        ready();
    }

    pub fn open(&mut self, request: &PopupRequest, sink: CompletionSink) -> Result<(), SdkError> {
        self.sink = Some(sink.clone());
        self.present(&request.url, sink);
        Ok(())
    }

    pub fn focus(&self) {
        self.bridge.focus();
    }

    pub fn close(&mut self) {
        if !self.closed.get() {
            self.bridge.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Re-present through the bridge with a new URL.
    pub fn redirect(&mut self, url: &str) {
        if let Some(sink) = self.sink.clone() {
            self.present(url, sink);
        }
    }

    fn present(&self, url: &str, sink: CompletionSink) {
        self.closed.set(false);
        let closed = self.closed.clone();
        self.bridge.open(
            url,
            Box::new(move |err, payload| {
                closed.set(true);
                sink(interpret_native(err, payload));
            }),
        );
    }
}

fn interpret_native(err: Option<Value>, payload: Option<Value>) -> crate::CompletionResult {
    let err = err.filter(|e| !e.is_null());
    let payload = payload.filter(|p| !p.is_null());
    match (err, payload) {
        (None, Some(payload)) => Ok(payload),
        (Some(native), _) => {
            tracing::debug!("popup bridge reported an error; treating as dismissal");
            Err(FlowError::Closed(
                SdkError::frame_closed().with_details(json!({ "nativeError": native })),
            ))
        }
        (None, None) => {
            tracing::debug!("popup bridge dismissed without a result");
            Err(FlowError::closed())
        }
    }
}
