//! Popup strategies.
//!
//! A strategy opens and manages the secondary browsing context for one
//! flow. Two mechanisms exist:
//!
//! - [`StandardPopup`]: a real popup window opened via a [`WindowOpener`].
//! - [`BridgePopup`]: a pseudo-popup driven by a host-provided
//!   [`NativeBridge`] inside embedded app contexts.
//!
//! Which one is used is decided once, when the service is built, from a
//! [`PopupEnvironment`]. The orchestrator only ever sees [`PopupStrategy`].

mod bridge;
mod standard;

pub use bridge::{BridgePopup, NativeBridge, NativeCompletion};
pub use standard::{popup_features, HostGeometry, PopupWindow, StandardPopup, WindowOpener};

use crate::config::PopupOptions;
use crate::errors::SdkError;
use crate::CompletionResult;
use std::rc::Rc;

/// Receives a result produced by the strategy itself (bridge callbacks).
pub type CompletionSink = Rc<dyn Fn(CompletionResult)>;

/// What to open and under which window name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupRequest {
    pub url: String,
    pub window_name: String,
}

/// Environment detection result, fixed for the lifetime of a service.
#[derive(Clone)]
pub enum PopupEnvironment {
    Standard(Rc<dyn WindowOpener>),
    Bridge(Rc<dyn NativeBridge>),
}

impl PopupEnvironment {
    /// Prefer the native bridge when the embedding app provides one.
    pub fn detect(opener: Rc<dyn WindowOpener>, bridge: Option<Rc<dyn NativeBridge>>) -> Self {
        match bridge {
            Some(bridge) => Self::Bridge(bridge),
            None => Self::Standard(opener),
        }
    }

    /// Build a fresh strategy for one flow.
    pub fn create_strategy(&self, options: PopupOptions) -> PopupStrategy {
        match self {
            Self::Standard(opener) => {
                PopupStrategy::Standard(StandardPopup::new(opener.clone(), options))
            }
            Self::Bridge(bridge) => PopupStrategy::Bridge(BridgePopup::new(bridge.clone())),
        }
    }
}

/// The active popup mechanism for one flow.
pub enum PopupStrategy {
    Standard(StandardPopup),
    Bridge(BridgePopup),
}

impl PopupStrategy {
    /// Prepare the strategy; `ready` runs once it can be opened.
    pub fn initialize<F: FnOnce()>(&mut self, ready: F) {
        match self {
            Self::Standard(popup) => popup.initialize(ready),
            Self::Bridge(popup) => popup.initialize(ready),
        }
    }

    pub fn open(&mut self, request: &PopupRequest, sink: CompletionSink) -> Result<(), SdkError> {
        match self {
            Self::Standard(popup) => popup.open(request),
            Self::Bridge(popup) => popup.open(request, sink),
        }
    }

    pub fn focus(&self) {
        match self {
            Self::Standard(popup) => popup.focus(),
            Self::Bridge(popup) => popup.focus(),
        }
    }

    pub fn close(&mut self) {
        match self {
            Self::Standard(popup) => popup.close(),
            Self::Bridge(popup) => popup.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Self::Standard(popup) => popup.is_closed(),
            Self::Bridge(popup) => popup.is_closed(),
        }
    }

    pub fn redirect(&mut self, url: &str) {
        match self {
            Self::Standard(popup) => popup.redirect(url),
            Self::Bridge(popup) => popup.redirect(url),
        }
    }
}
