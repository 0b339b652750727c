//! Mock browser collaborators.

use crate::bus::BusTransport;
use crate::dispatch::DispatchContext;
use crate::platform::{FrameHost, FrameNodeId, FrameSpec};
use crate::popup::{HostGeometry, NativeBridge, NativeCompletion, PopupWindow, WindowOpener};
use crate::scripts::PopupContext;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Host document recording appended and removed frames.
#[derive(Default)]
pub struct MockFrameHost {
    next_id: Cell<u64>,
    frames: RefCell<Vec<(FrameNodeId, FrameSpec)>>,
    removed: RefCell<Vec<FrameNodeId>>,
    routes: RefCell<HashMap<String, Rc<dyn BusTransport>>>,
}

impl MockFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames currently attached to the document.
    pub fn frames(&self) -> Vec<FrameSpec> {
        self.frames
            .borrow()
            .iter()
            .map(|(_, spec)| spec.clone())
            .collect()
    }

    pub fn remove_count(&self) -> usize {
        self.removed.borrow().len()
    }

    /// Make a named frame addressable through `transport`.
    pub fn register_route(&self, name: &str, transport: Rc<dyn BusTransport>) {
        self.routes.borrow_mut().insert(name.to_string(), transport);
    }
}

impl FrameHost for MockFrameHost {
    fn append_frame(&self, spec: &FrameSpec) -> FrameNodeId {
        let id = FrameNodeId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.frames.borrow_mut().push((id, spec.clone()));
        id
    }

    fn remove_frame(&self, node: FrameNodeId) {
        self.frames.borrow_mut().retain(|(id, _)| *id != node);
        self.removed.borrow_mut().push(node);
    }

    fn locate_frame(&self, name: &str) -> Option<Rc<dyn BusTransport>> {
        let attached = self.frames.borrow().iter().any(|(_, spec)| spec.name == name);
        if !attached {
            return None;
        }
        self.routes.borrow().get(name).cloned()
    }
}

/// A popup window whose closed state tests control.
#[derive(Debug, Default)]
pub struct MockPopupWindow {
    pub url: RefCell<String>,
    pub name: String,
    pub features: String,
    closed: Cell<bool>,
    host_closes: Cell<u32>,
    focuses: Cell<u32>,
    navigations: RefCell<Vec<String>>,
}

impl MockPopupWindow {
    /// The customer closes the window.
    pub fn user_close(&self) {
        self.closed.set(true);
    }

    pub fn closed(&self) -> bool {
        self.closed.get()
    }

    /// How many times the SDK itself closed this window.
    pub fn host_closes(&self) -> u32 {
        self.host_closes.get()
    }

    pub fn focuses(&self) -> u32 {
        self.focuses.get()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.borrow().clone()
    }
}

struct SharedWindow(Rc<MockPopupWindow>);

impl PopupWindow for SharedWindow {
    fn is_closed(&self) -> bool {
        self.0.closed.get()
    }

    fn close(&self) {
        self.0.closed.set(true);
        self.0.host_closes.set(self.0.host_closes.get() + 1);
    }

    fn focus(&self) {
        self.0.focuses.set(self.0.focuses.get() + 1);
    }

    fn navigate(&self, url: &str) {
        *self.0.url.borrow_mut() = url.to_string();
        self.0.navigations.borrow_mut().push(url.to_string());
    }
}

/// `window.open` stand-in.
#[derive(Default)]
pub struct MockWindowOpener {
    windows: RefCell<Vec<Rc<MockPopupWindow>>>,
    blocked: Cell<bool>,
    geometry: Cell<HostGeometry>,
}

impl MockWindowOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a popup blocker.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.set(blocked);
    }

    pub fn set_geometry(&self, geometry: HostGeometry) {
        self.geometry.set(geometry);
    }

    pub fn open_count(&self) -> usize {
        self.windows.borrow().len()
    }

    pub fn last_window(&self) -> Option<Rc<MockPopupWindow>> {
        self.windows.borrow().last().cloned()
    }

    pub fn window_named(&self, name: &str) -> Option<Rc<MockPopupWindow>> {
        self.windows
            .borrow()
            .iter()
            .rev()
            .find(|w| w.name == name)
            .cloned()
    }
}

impl WindowOpener for MockWindowOpener {
    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>> {
        if self.blocked.get() {
            return None;
        }
        let window = Rc::new(MockPopupWindow {
            url: RefCell::new(url.to_string()),
            name: name.to_string(),
            features: features.to_string(),
            ..MockPopupWindow::default()
        });
        self.windows.borrow_mut().push(window.clone());
        Some(Box::new(SharedWindow(window)))
    }

    fn geometry(&self) -> HostGeometry {
        self.geometry.get()
    }
}

/// `window.popupBridge` stand-in. Tests finish the native flow with
/// [`MockBridge::complete`].
#[derive(Default)]
pub struct MockBridge {
    opened: RefCell<Vec<String>>,
    pending: RefCell<Option<NativeCompletion>>,
    closes: Cell<u32>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    pub fn closes(&self) -> u32 {
        self.closes.get()
    }

    /// Fire the native completion. Returns false if nothing was pending.
    pub fn complete(&self, err: Option<Value>, payload: Option<Value>) -> bool {
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(on_complete) => {
                on_complete(err, payload);
                true
            }
            None => false,
        }
    }
}

impl NativeBridge for MockBridge {
    fn open(&self, url: &str, on_complete: NativeCompletion) {
        self.opened.borrow_mut().push(url.to_string());
        *self.pending.borrow_mut() = Some(on_complete);
    }

    fn close(&self) {
        self.closes.set(self.closes.get() + 1);
    }
}

/// The popup as seen by a landing-page script.
pub struct MockPopupContext {
    pub query: String,
    pub window_name: String,
    dispatch: Option<(String, Rc<dyn BusTransport>)>,
    window: Option<Rc<MockPopupWindow>>,
    self_closes: Cell<u32>,
}

impl MockPopupContext {
    pub fn new(query: impl Into<String>, window_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            window_name: window_name.into(),
            dispatch: None,
            window: None,
            self_closes: Cell::new(0),
        }
    }

    /// Make the dispatch frame reachable under `frame_name`.
    pub fn with_dispatch(mut self, frame_name: &str, transport: Rc<dyn BusTransport>) -> Self {
        self.dispatch = Some((frame_name.to_string(), transport));
        self
    }

    /// Link to the host's view of this window, so self-closing is visible.
    pub fn with_window(mut self, window: Rc<MockPopupWindow>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn self_closes(&self) -> u32 {
        self.self_closes.get()
    }
}

impl PopupContext for MockPopupContext {
    fn query(&self) -> String {
        self.query.clone()
    }

    fn window_name(&self) -> String {
        self.window_name.clone()
    }

    fn locate_dispatch_frame(&self, frame_name: &str) -> Option<Rc<dyn BusTransport>> {
        self.dispatch
            .as_ref()
            .filter(|(name, _)| name == frame_name)
            .map(|(_, transport)| transport.clone())
    }

    fn close_window(&self) {
        self.self_closes.set(self.self_closes.get() + 1);
        if let Some(window) = &self.window {
            window.user_close();
        }
    }
}

/// The dispatch frame as seen by its own page.
pub struct MockDispatchContext {
    pub frame_name: String,
    pub parent: Option<Rc<dyn BusTransport>>,
}

impl DispatchContext for MockDispatchContext {
    fn frame_name(&self) -> String {
        self.frame_name.clone()
    }

    fn parent(&self) -> Option<Rc<dyn BusTransport>> {
        self.parent.clone()
    }
}
